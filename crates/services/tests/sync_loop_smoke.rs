use std::sync::Arc;
use std::time::Duration;

use progress_core::model::{
    Program, ProgramId, ProgramStatus, ProgressKey, Task, TaskId, UserId,
};
use progress_core::time::fixed_clock;
use services::{
    ConfirmationWorkflow, ProgressAggregator, ProgressSyncService, ReviewDecision, SyncState,
    TaskProgressService,
};
use storage::repository::{ProgramRepository, Storage};

fn build_program(id: u64, title: &str, task_count: u64) -> Program {
    let program_id = ProgramId::new(id);
    let tasks = (1..=task_count)
        .map(|n| {
            Task::new(
                TaskId::new(id * 10 + n),
                program_id,
                u32::try_from(n).unwrap(),
                format!("Task {n}"),
                None,
            )
            .unwrap()
        })
        .collect();
    Program::new(program_id, title, tasks).unwrap()
}

struct Harness {
    tasks: TaskProgressService,
    confirmations: ConfirmationWorkflow,
    sync: ProgressSyncService,
    user: UserId,
}

async fn harness(programs: &[Program]) -> Harness {
    let storage = Storage::in_memory();
    for program in programs {
        storage.programs.upsert_program(program).await.unwrap();
    }
    let clock = fixed_clock();
    let tasks = TaskProgressService::new(
        clock,
        Arc::clone(&storage.progress),
        Arc::clone(&storage.objects),
    );
    let confirmations = ConfirmationWorkflow::new(clock, Arc::clone(&storage.progress));
    let aggregator = Arc::new(ProgressAggregator::new(
        clock,
        Arc::clone(&storage.programs),
        Arc::clone(&storage.progress),
    ));
    let sync = ProgressSyncService::new(clock, aggregator).with_interval(Duration::from_millis(1));
    Harness {
        tasks,
        confirmations,
        sync,
        user: UserId::random(),
    }
}

#[tokio::test]
async fn polling_picks_up_review_decisions() {
    let h = harness(&[build_program(1, "Data Analytics", 3)]).await;
    let key = |task| ProgressKey::new(h.user, ProgramId::new(1), TaskId::new(task));

    // Task 1 accepted, task 2 awaiting review, task 3 untouched.
    let t1 = h
        .tasks
        .submit_work(h.user, &key(11), "https://cdn.example/t1.pdf")
        .await
        .unwrap();
    h.confirmations
        .decide(t1.id.unwrap(), ReviewDecision::Accepted, "solid", None)
        .await
        .unwrap();
    let t2 = h
        .tasks
        .submit_work(h.user, &key(12), "https://cdn.example/t2.pdf")
        .await
        .unwrap();

    let snapshot = h.sync.poll_once(h.user).await.unwrap();
    assert_eq!(snapshot.items.len(), 1);
    let view = &snapshot.items[0].view;
    assert_eq!(view.completed_count, 2);
    assert_eq!(view.percentage, 67);
    assert_eq!(view.status, ProgramStatus::InProgress);
    assert!(!view.fully_approved);

    // The reviewer works through the rest; the next poll sees it all.
    h.confirmations
        .decide(t2.id.unwrap(), ReviewDecision::Accepted, "good", None)
        .await
        .unwrap();
    let t3 = h
        .tasks
        .submit_work(h.user, &key(13), "https://cdn.example/t3.pdf")
        .await
        .unwrap();
    h.confirmations
        .decide(t3.id.unwrap(), ReviewDecision::Accepted, "done", None)
        .await
        .unwrap();

    let snapshot = h.sync.poll_once(h.user).await.unwrap();
    let view = &snapshot.items[0].view;
    assert_eq!(view.completed_count, 3);
    assert_eq!(view.percentage, 100);
    assert_eq!(view.status, ProgramStatus::Completed);
    assert!(view.fully_approved);
}

#[tokio::test]
async fn overview_lists_active_programs_first() {
    let h = harness(&[
        build_program(1, "Finished First", 1),
        build_program(2, "Still Active", 2),
    ])
    .await;

    // Program 1 fully done, program 2 barely started.
    let done = h
        .tasks
        .submit_work(
            h.user,
            &ProgressKey::new(h.user, ProgramId::new(1), TaskId::new(11)),
            "https://cdn.example/done.pdf",
        )
        .await
        .unwrap();
    h.confirmations
        .decide(done.id.unwrap(), ReviewDecision::Accepted, "done", None)
        .await
        .unwrap();
    h.tasks
        .open_task(
            h.user,
            &ProgressKey::new(h.user, ProgramId::new(2), TaskId::new(21)),
        )
        .await
        .unwrap();

    let snapshot = h.sync.poll_once(h.user).await.unwrap();
    let titles: Vec<&str> = snapshot.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Still Active", "Finished First"]);
}

#[tokio::test]
async fn snapshots_replace_local_state_wholesale() {
    let h = harness(&[build_program(1, "Data Analytics", 2)]).await;
    let key = ProgressKey::new(h.user, ProgramId::new(1), TaskId::new(11));

    h.tasks.open_task(h.user, &key).await.unwrap();

    let mut state = SyncState::new();
    state.replace(h.sync.poll_once(h.user).await.unwrap());
    assert_eq!(state.current().unwrap().items.len(), 1);

    // The optimistic submit is written through storage before the next poll,
    // so replacement cannot lose it.
    h.tasks
        .submit_work(h.user, &key, "https://cdn.example/t1.pdf")
        .await
        .unwrap();
    state.replace(h.sync.poll_once(h.user).await.unwrap());

    let view = &state.current().unwrap().items[0].view;
    assert_eq!(view.completed_count, 1);
}

#[tokio::test]
async fn run_stops_once_the_consumer_declines() {
    let h = harness(&[build_program(1, "Data Analytics", 1)]).await;
    h.tasks
        .open_task(
            h.user,
            &ProgressKey::new(h.user, ProgramId::new(1), TaskId::new(11)),
        )
        .await
        .unwrap();

    let mut ticks = 0;
    h.sync
        .run(h.user, |snapshot| {
            assert_eq!(snapshot.items.len(), 1);
            ticks += 1;
            ticks < 3
        })
        .await;

    assert_eq!(ticks, 3);
}
