use progress_core::model::{
    ArtifactUrl, ConfirmationStatus, Program, ProgramId, ProgressKey, Task, TaskId, TaskStatus,
    UserId,
};
use progress_core::time::fixed_now;
use storage::repository::{ProgramRepository, ProgressPatch, ProgressRepository};
use storage::sqlite::SqliteRepository;

fn build_program(id: u64, task_count: u64) -> Program {
    let program_id = ProgramId::new(id);
    let tasks = (1..=task_count)
        .map(|n| {
            Task::new(
                TaskId::new(id * 100 + n),
                program_id,
                u32::try_from(n).unwrap(),
                format!("Task {n}"),
                None,
            )
            .unwrap()
        })
        .collect();
    Program::new(program_id, format!("Program {id}"), tasks).unwrap()
}

fn submitted_patch(url: &str) -> ProgressPatch {
    ProgressPatch {
        status: Some(TaskStatus::Completed),
        confirmation_status: Some(ConfirmationStatus::Pending),
        uploaded_work_url: Some(Some(ArtifactUrl::parse(url).unwrap())),
        comment: Some(None),
    }
}

#[tokio::test]
async fn upsert_keeps_one_row_per_key() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_upsert?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let program = build_program(1, 3);
    repo.upsert_program(&program).await.unwrap();

    let user = UserId::random();
    let key = ProgressKey::new(user, program.id(), TaskId::new(101));
    let now = fixed_now();

    let opened = repo
        .upsert(
            &key,
            ProgressPatch {
                status: Some(TaskStatus::InProgress),
                confirmation_status: Some(ConfirmationStatus::None),
                ..ProgressPatch::default()
            },
            now,
        )
        .await
        .unwrap();
    let row_id = opened.id.expect("row id");

    // Second write for the same key lands on the same row.
    let later = now + chrono::Duration::seconds(30);
    let submitted = repo
        .upsert(&key, submitted_patch("https://cdn.example/v1.pdf"), later)
        .await
        .unwrap();

    assert_eq!(submitted.id, Some(row_id));
    assert_eq!(submitted.status, TaskStatus::Completed);
    assert_eq!(submitted.updated_at, later);

    let records = repo.list_by_user(user).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn decision_patch_preserves_artifact_url() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_patch?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let program = build_program(2, 1);
    repo.upsert_program(&program).await.unwrap();

    let key = ProgressKey::new(UserId::random(), program.id(), TaskId::new(201));
    let now = fixed_now();
    let submitted = repo
        .upsert(&key, submitted_patch("https://cdn.example/work.pdf"), now)
        .await
        .unwrap();

    let decided = repo
        .update_by_id(
            submitted.id.unwrap(),
            ProgressPatch {
                confirmation_status: Some(ConfirmationStatus::Rejected),
                comment: Some(Some("needs a conclusion".into())),
                ..ProgressPatch::default()
            },
            now + chrono::Duration::minutes(1),
        )
        .await
        .unwrap();

    assert_eq!(decided.status, TaskStatus::Completed);
    assert_eq!(decided.confirmation_status, ConfirmationStatus::Rejected);
    assert_eq!(
        decided.uploaded_work_url.as_ref().map(ArtifactUrl::as_str),
        Some("https://cdn.example/work.pdf")
    );
    assert_eq!(decided.comment.as_deref(), Some("needs a conclusion"));
}

#[tokio::test]
async fn legacy_acceptance_spellings_normalize_on_read() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_synonyms?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let program = build_program(3, 2);
    repo.upsert_program(&program).await.unwrap();

    let user = UserId::random();
    // Rows written by an older system that used synonym spellings.
    for (task_id, spelling) in [(301_i64, "confirmed"), (302_i64, "approved")] {
        sqlx::query(
            r"
            INSERT INTO task_progress
                (user_id, program_id, task_id, status, confirmation_status, updated_at)
            VALUES (?1, 3, ?2, 'completed', ?3, ?4)
            ",
        )
        .bind(user.to_string())
        .bind(task_id)
        .bind(spelling)
        .bind(fixed_now())
        .execute(repo.pool())
        .await
        .unwrap();
    }

    let records = repo.list_by_user(user).await.unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.confirmation_status, ConfirmationStatus::Accepted);
    }
}

#[tokio::test]
async fn pending_queue_spans_users_oldest_first() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_pending?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let program = build_program(4, 2);
    repo.upsert_program(&program).await.unwrap();

    let now = fixed_now();
    let early = UserId::random();
    let late = UserId::random();

    repo.upsert(
        &ProgressKey::new(late, program.id(), TaskId::new(401)),
        submitted_patch("https://cdn.example/late.pdf"),
        now + chrono::Duration::minutes(5),
    )
    .await
    .unwrap();
    repo.upsert(
        &ProgressKey::new(early, program.id(), TaskId::new(401)),
        submitted_patch("https://cdn.example/early.pdf"),
        now,
    )
    .await
    .unwrap();
    // An accepted record never shows up in the queue.
    let accepted = repo
        .upsert(
            &ProgressKey::new(early, program.id(), TaskId::new(402)),
            submitted_patch("https://cdn.example/done.pdf"),
            now,
        )
        .await
        .unwrap();
    repo.update_by_id(
        accepted.id.unwrap(),
        ProgressPatch {
            confirmation_status: Some(ConfirmationStatus::Accepted),
            comment: Some(Some("great work".into())),
            ..ProgressPatch::default()
        },
        now + chrono::Duration::minutes(1),
    )
    .await
    .unwrap();

    let queue = repo.list_pending().await.unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].key.user_id, early);
    assert_eq!(queue[1].key.user_id, late);
}

#[tokio::test]
async fn program_roundtrips_with_ordered_tasks() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_programs?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let program = build_program(5, 3);
    repo.upsert_program(&program).await.unwrap();

    let fetched = repo.get_program(program.id()).await.unwrap();
    assert_eq!(fetched, program);
    assert_eq!(
        fetched.task_ids(),
        vec![TaskId::new(501), TaskId::new(502), TaskId::new(503)]
    );

    assert!(matches!(
        repo.get_program(ProgramId::new(99)).await,
        Err(storage::repository::StorageError::NotFound)
    ));
}
