//! ToggleOrchestrator end-to-end tests
//!
//! Each test drives the door service by hand: yield to let the pipelines
//! reach the mover hand-off, then tick.

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc as std_mpsc, Arc};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use voxel_doors::{
        activity::ActivityRegistry,
        archetype::{ArchetypeRegistry, SlidingDoor},
        autoclose::AutoCloseScheduler,
        block::BlockState,
        error::{GeometryError, MoverError, StoreError, ToggleError},
        events::{
            EventBus, PrepareToggleEvent, ToggleEndEvent, ToggleFailedEvent, ToggleListener,
            ToggleStartEvent, Verdict,
        },
        orchestrator::{Collaborators, ToggleOrchestrator},
        request::{
            Rejection, StructureSelector, ToggleAction, ToggleCause, ToggleOutcome, ToggleRequest,
        },
        service::DoorService,
        structure::{MemoryStore, Structure, StructureStore, USER},
        types::{Cuboid, Direction, DoorServiceConfig, PlayerId, StructureId, Vec3i},
        world::{AllowAll, AuthorizationProvider, DefaultClassifier, MemoryWorld, ProtectedRegions},
    };

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Harness {
        orch: Arc<ToggleOrchestrator>,
        service: Arc<Mutex<DoorService>>,
        world: Arc<MemoryWorld>,
        store: Arc<MemoryStore>,
        requests: mpsc::UnboundedReceiver<ToggleRequest>,
    }

    fn harness_with(
        authorization: Arc<dyn AuthorizationProvider>,
        store: Arc<dyn StructureStore>,
        memory: Arc<MemoryStore>,
        events: Arc<EventBus>,
    ) -> Harness {
        let config = DoorServiceConfig::default();
        let world = Arc::new(MemoryWorld::new());
        let classifier = Arc::new(DefaultClassifier::from_config(&config));
        let service = DoorService::new(config.clone(), world.clone(), classifier);
        let movers = service.queue();
        let (tx, requests) = mpsc::unbounded_channel();

        let orch = Arc::new(ToggleOrchestrator::new(
            config,
            Collaborators {
                archetypes: Arc::new(ArchetypeRegistry::with_builtin()),
                store,
                world: world.clone(),
                authorization,
                events,
                activity: Arc::new(ActivityRegistry::new()),
                auto_close: Arc::new(AutoCloseScheduler::new(tx)),
                movers,
            },
        ));

        Harness {
            orch,
            service: Arc::new(Mutex::new(service)),
            world,
            store: memory,
            requests,
        }
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        harness_with(
            Arc::new(AllowAll),
            store.clone(),
            store,
            Arc::new(EventBus::new()),
        )
    }

    fn alice() -> PlayerId {
        PlayerId::new("alice")
    }

    /// 4x4 sliding door at z = 0 that opens 4 blocks north.
    fn sliding_door(id: u64, x: i32) -> Structure {
        Structure::new(
            StructureId(id),
            SlidingDoor::NAME,
            Cuboid::new(Vec3i::new(x, 0, 0), Vec3i::new(x + 3, 3, 0)),
            Vec3i::new(x, 0, 0),
            Direction::North,
            alice(),
        )
        .with_blocks_to_move(4)
    }

    fn place(h: &Harness, structure: Structure) {
        h.world.fill(structure.cuboid, &BlockState::new("stone"));
        h.store.insert(structure);
    }

    fn spawn_submit(
        h: &Harness,
        request: ToggleRequest,
    ) -> JoinHandle<Vec<(StructureId, ToggleOutcome)>> {
        let orch = Arc::clone(&h.orch);
        tokio::spawn(async move { orch.submit(request).await })
    }

    async fn drive<T>(h: &Harness, task: JoinHandle<T>) -> T {
        for _ in 0..10_000 {
            if task.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
            h.service.lock().tick();
        }
        task.await.unwrap()
    }

    async fn toggle(h: &Harness, request: ToggleRequest) -> ToggleOutcome {
        let mut outcomes = drive(h, spawn_submit(h, request)).await;
        assert_eq!(outcomes.len(), 1);
        outcomes.remove(0).1
    }

    fn open_request(id: u64) -> ToggleRequest {
        ToggleRequest::player(StructureId(id), alice(), ToggleAction::Toggle)
    }

    fn north(x: i32) -> Cuboid {
        Cuboid::new(Vec3i::new(x, 0, -4), Vec3i::new(x + 3, 3, -4))
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        veto: Mutex<Option<String>>,
    }

    impl ToggleListener for Recorder {
        fn on_prepare(&self, event: &PrepareToggleEvent) -> Verdict {
            self.seen.lock().push(format!("prepare {}", event.structure.id));
            match &*self.veto.lock() {
                Some(reason) => Verdict::Cancelled(reason.clone()),
                None => Verdict::Allowed,
            }
        }

        fn on_start(&self, event: &ToggleStartEvent) {
            self.seen.lock().push(format!("start {}", event.structure_id));
        }

        fn on_end(&self, event: &ToggleEndEvent) {
            self.seen.lock().push(format!("end {} open={}", event.structure_id, event.is_open));
        }

        fn on_failed(&self, event: &ToggleFailedEvent) {
            self.seen.lock().push(format!("failed {}", event.structure_id));
        }
    }

    /// Lets the first prepare through and parks every later one until released.
    struct Stall {
        calls: AtomicUsize,
        entered: Mutex<std_mpsc::Sender<()>>,
        release: Mutex<std_mpsc::Receiver<()>>,
    }

    impl ToggleListener for Stall {
        fn on_prepare(&self, _event: &PrepareToggleEvent) -> Verdict {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                let _ = self.entered.lock().send(());
                let _ = self.release.lock().recv_timeout(Duration::from_secs(5));
            }
            Verdict::Allowed
        }
    }

    // -----------------------------------------------------------------------
    // Completed toggles
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn opening_moves_blocks_and_schedules_auto_close() {
        let h = harness();
        place(&h, sliding_door(1, 0).with_auto_close(5));

        let outcome = toggle(&h, open_request(1)).await;
        let report = outcome.report().expect("completed");

        assert!(report.structure.is_open);
        assert_eq!(report.structure.cuboid, north(0));
        assert_eq!(report.previous_cuboid, Cuboid::new(Vec3i::ZERO, Vec3i::new(3, 3, 0)));
        assert_eq!(report.committed_blocks, 16);
        assert!(report.persisted);
        assert!(report.auto_close_scheduled);

        let stored = h.store.get(StructureId(1)).unwrap();
        assert!(stored.is_open);
        assert_eq!(stored.cuboid, north(0));
        assert_eq!(h.world.blocks_in(north(0)).len(), 16);
        assert_eq!(h.world.non_air_count(), 16);

        assert!(h.orch.auto_close().is_scheduled(StructureId(1)));
        assert!(!h.orch.activity().is_active(StructureId(1)));
        assert_eq!(h.service.lock().stats().completed, 1);
    }

    #[tokio::test]
    async fn closing_returns_to_the_original_cuboid() {
        let h = harness();
        place(&h, sliding_door(1, 0));

        assert!(toggle(&h, open_request(1)).await.is_completed());
        let outcome = toggle(
            &h,
            ToggleRequest::player(StructureId(1), alice(), ToggleAction::Close).skipping_animation(),
        )
        .await;

        let report = outcome.report().expect("completed");
        assert!(!report.structure.is_open);
        assert_eq!(report.structure.cuboid, Cuboid::new(Vec3i::ZERO, Vec3i::new(3, 3, 0)));
        assert_eq!(h.world.blocks_in(report.structure.cuboid).len(), 16);
        assert!(!report.auto_close_scheduled);
    }

    #[tokio::test]
    async fn manual_toggle_cancels_pending_auto_close() {
        let h = harness();
        place(&h, sliding_door(1, 0).with_auto_close(30));
        toggle(&h, open_request(1)).await;
        assert!(h.orch.auto_close().is_scheduled(StructureId(1)));

        let outcome = toggle(&h, open_request(1).skipping_animation()).await;
        assert!(outcome.is_completed());
        assert!(!h.orch.auto_close().is_scheduled(StructureId(1)));
    }

    #[tokio::test]
    async fn rejected_manual_toggle_keeps_auto_close() {
        let events = Arc::new(EventBus::new());
        let recorder = Arc::new(Recorder::default());
        events.subscribe(recorder.clone());
        let store = Arc::new(MemoryStore::new());
        let h = harness_with(Arc::new(AllowAll), store.clone(), store, events);
        place(&h, sliding_door(1, 0).with_auto_close(30));
        assert!(toggle(&h, open_request(1).skipping_animation()).await.is_completed());
        assert!(h.orch.auto_close().is_scheduled(StructureId(1)));

        *recorder.veto.lock() = Some("region closed".into());
        let outcome = toggle(&h, open_request(1)).await;
        assert_eq!(
            outcome.rejection(),
            Some(&Rejection::Cancelled("region closed".into()))
        );
        assert!(h.orch.auto_close().is_scheduled(StructureId(1)));

        *recorder.veto.lock() = None;
        let lease = h.orch.activity().try_acquire(StructureId(1)).unwrap();
        let outcome = toggle(&h, open_request(1)).await;
        assert_eq!(outcome.rejection(), Some(&Rejection::Busy));
        assert!(h.orch.auto_close().is_scheduled(StructureId(1)));
        drop(lease);

        assert!(h.store.get(StructureId(1)).unwrap().is_open);
        assert_eq!(h.world.blocks_in(north(0)).len(), 16);
    }

    #[tokio::test]
    async fn user_level_owner_may_toggle() {
        let h = harness();
        let mut door = sliding_door(1, 0);
        door.add_owner(PlayerId::new("bob"), USER);
        place(&h, door);

        let outcome = toggle(
            &h,
            ToggleRequest::player(StructureId(1), PlayerId::new("bob"), ToggleAction::Open)
                .skipping_animation(),
        )
        .await;
        assert!(outcome.is_completed());
    }

    // -----------------------------------------------------------------------
    // Exclusivity
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn concurrent_toggles_of_one_structure_yield_one_busy() {
        let h = harness();
        place(&h, sliding_door(1, 0));

        let first = spawn_submit(&h, open_request(1));
        let second = spawn_submit(&h, open_request(1));
        let first = drive(&h, first).await.remove(0).1;
        let second = drive(&h, second).await.remove(0).1;

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|o| o.is_completed()).count(), 1);
        assert_eq!(
            outcomes.iter().filter_map(|o| o.rejection()).collect::<Vec<_>>(),
            vec![&Rejection::Busy]
        );
        assert_eq!(h.world.non_air_count(), 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn toggle_prepared_against_stale_state_is_busy() {
        let (entered_tx, entered_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let events = Arc::new(EventBus::new());
        events.subscribe(Arc::new(Stall {
            calls: AtomicUsize::new(0),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        }));
        let store = Arc::new(MemoryStore::new());
        let h = harness_with(Arc::new(AllowAll), store.clone(), store, events);
        place(&h, sliding_door(1, 0));

        // The first toggle holds the lease and waits on the door service.
        let first = spawn_submit(&h, open_request(1));
        for _ in 0..5_000 {
            if h.orch.activity().is_active(StructureId(1)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(h.orch.activity().is_active(StructureId(1)));

        // The second loads the closed door, then parks in prepare.
        let second = spawn_submit(&h, open_request(1));
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("second toggle reached prepare");

        for _ in 0..5_000 {
            if first.is_finished() {
                break;
            }
            h.service.lock().tick();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let first = first.await.unwrap().remove(0).1;
        assert_eq!(first.report().expect("completed").committed_blocks, 16);
        assert!(!h.orch.activity().is_active(StructureId(1)));

        release_tx.send(()).unwrap();
        let second = second.await.unwrap().remove(0).1;
        assert_eq!(second.rejection(), Some(&Rejection::Busy));

        let stored = h.store.get(StructureId(1)).unwrap();
        assert!(stored.is_open);
        assert_eq!(stored.cuboid, north(0));
        assert_eq!(h.world.blocks_in(north(0)).len(), 16);
        assert_eq!(h.world.non_air_count(), 16);
        assert_eq!(h.service.lock().stats().completed, 1);
    }

    #[tokio::test]
    async fn held_lease_makes_toggle_busy() {
        let h = harness();
        place(&h, sliding_door(1, 0));
        let _lease = h.orch.activity().try_acquire(StructureId(1)).unwrap();

        let outcome = toggle(&h, open_request(1)).await;
        assert_eq!(outcome.rejection(), Some(&Rejection::Busy));
        assert_eq!(h.service.lock().stats().completed, 0);
    }

    // -----------------------------------------------------------------------
    // Rejections
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn denied_protection_changes_nothing() {
        let regions = Arc::new(ProtectedRegions::new());
        regions.protect(Cuboid::new(Vec3i::new(2, 1, -4), Vec3i::new(2, 1, -4)));
        let store = Arc::new(MemoryStore::new());
        let h = harness_with(regions, store.clone(), store, Arc::new(EventBus::new()));
        let door = sliding_door(1, 0);
        place(&h, door.clone());

        let outcome = toggle(&h, open_request(1)).await;
        assert_eq!(
            outcome.rejection(),
            Some(&Rejection::Unauthorized { at: Vec3i::new(2, 1, -4) })
        );
        assert_eq!(h.store.get(StructureId(1)).unwrap(), door);
        assert_eq!(h.world.blocks_in(door.cuboid).len(), 16);
        assert!(h.world.write_log().is_empty());
        assert!(!h.orch.activity().is_active(StructureId(1)));
        assert_eq!(h.service.lock().stats().in_flight, 0);
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected() {
        let h = harness();
        let mut locked = sliding_door(2, 10);
        locked.set_locked(true);
        place(&h, sliding_door(1, 0));
        place(&h, locked);

        let stranger =
            ToggleRequest::player(StructureId(1), PlayerId::new("mallory"), ToggleAction::Toggle);
        assert_eq!(
            toggle(&h, stranger).await.rejection(),
            Some(&Rejection::NoPermission)
        );

        let close_closed = ToggleRequest::player(StructureId(1), alice(), ToggleAction::Close);
        assert_eq!(
            toggle(&h, close_closed).await.rejection(),
            Some(&Rejection::AlreadyInState)
        );

        assert_eq!(
            toggle(&h, open_request(2)).await.rejection(),
            Some(&Rejection::Locked)
        );

        let missing = ToggleRequest::new(
            StructureSelector::One(StructureId(404)),
            ToggleCause::Signal,
            ToggleAction::Toggle,
        );
        assert_eq!(
            toggle(&h, missing).await.rejection(),
            Some(&Rejection::NotFound)
        );

        assert!(h.world.write_log().is_empty());
    }

    #[tokio::test]
    async fn listener_can_veto_a_toggle() {
        let events = Arc::new(EventBus::new());
        let recorder = Arc::new(Recorder {
            veto: Mutex::new(Some("maintenance".into())),
            ..Default::default()
        });
        events.subscribe(recorder.clone());
        let store = Arc::new(MemoryStore::new());
        let h = harness_with(Arc::new(AllowAll), store.clone(), store, events);
        place(&h, sliding_door(1, 0));

        let outcome = toggle(&h, open_request(1)).await;
        assert_eq!(
            outcome.rejection(),
            Some(&Rejection::Cancelled("maintenance".into()))
        );
        assert_eq!(*recorder.seen.lock(), vec!["prepare #1".to_string()]);
        assert!(!h.orch.activity().is_active(StructureId(1)));
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn obstructed_destination_fails_before_any_write() {
        let h = harness();
        place(&h, sliding_door(1, 0));
        h.world.set(Vec3i::new(0, 0, -4), BlockState::new("dirt"));

        let outcome = toggle(&h, open_request(1)).await;
        assert_eq!(
            outcome,
            ToggleOutcome::Failed(ToggleError::Geometry(GeometryError::Obstructed {
                at: Vec3i::new(0, 0, -4)
            }))
        );
        assert!(h.world.write_log().is_empty());
    }

    #[tokio::test]
    async fn aborted_animation_fails_and_keeps_structure() {
        let events = Arc::new(EventBus::new());
        let recorder = Arc::new(Recorder::default());
        events.subscribe(recorder.clone());
        let store = Arc::new(MemoryStore::new());
        let h = harness_with(Arc::new(AllowAll), store.clone(), store, events);
        let door = sliding_door(1, 0);
        place(&h, door.clone());

        let task = spawn_submit(&h, open_request(1));
        for _ in 0..100 {
            tokio::task::yield_now().await;
            if h.service.lock().tick().in_flight > 0 {
                break;
            }
        }
        assert!(h.orch.abort(StructureId(1)));

        let outcome = drive(&h, task).await.remove(0).1;
        assert_eq!(
            outcome,
            ToggleOutcome::Failed(ToggleError::Mover(MoverError::Cancelled))
        );
        assert_eq!(h.store.get(StructureId(1)).unwrap(), door);
        assert_eq!(h.world.blocks_in(door.cuboid).len(), 16);
        assert_eq!(h.world.moving_count(), 0);
        assert_eq!(
            *recorder.seen.lock(),
            vec!["prepare #1", "start #1", "failed #1"]
        );
    }

    /// Loads from memory, refuses every save.
    struct FailingStore(Arc<MemoryStore>);

    impl StructureStore for FailingStore {
        fn load_structure(&self, id: StructureId) -> Result<Structure, StoreError> {
            self.0.load_structure(id)
        }

        fn save_structure(&self, _structure: &Structure) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
    }

    #[tokio::test]
    async fn failed_save_still_completes_unpersisted() {
        let events = Arc::new(EventBus::new());
        let recorder = Arc::new(Recorder::default());
        events.subscribe(recorder.clone());
        let memory = Arc::new(MemoryStore::new());
        let h = harness_with(
            Arc::new(AllowAll),
            Arc::new(FailingStore(memory.clone())),
            memory,
            events,
        );
        place(&h, sliding_door(1, 0));

        let outcome = toggle(&h, open_request(1).skipping_animation()).await;
        let report = outcome.report().expect("completed");
        assert!(!report.persisted);
        assert!(report.structure.is_open);
        assert_eq!(h.world.blocks_in(north(0)).len(), 16);
        // Storage still holds the old state.
        assert!(!h.store.get(StructureId(1)).unwrap().is_open);
        assert_eq!(
            *recorder.seen.lock(),
            vec!["prepare #1", "start #1", "end #1 open=true"]
        );
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn one_request_toggles_many_structures_independently() {
        let mut h = harness();
        place(&h, sliding_door(1, 0));
        place(&h, sliding_door(2, 10).with_auto_close(60));

        let request = ToggleRequest::new(
            StructureSelector::Many(vec![StructureId(1), StructureId(404), StructureId(2), StructureId(1)]),
            ToggleCause::Signal,
            ToggleAction::Open,
        );
        let outcomes = drive(&h, spawn_submit(&h, request)).await;

        let ids: Vec<_> = outcomes.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![StructureId(1), StructureId(404), StructureId(2)]);
        assert!(outcomes[0].1.is_completed());
        assert_eq!(outcomes[1].1.rejection(), Some(&Rejection::NotFound));
        assert!(outcomes[2].1.is_completed());

        assert_eq!(h.world.blocks_in(north(0)).len(), 16);
        assert_eq!(h.world.blocks_in(north(10)).len(), 16);
        assert!(h.requests.try_recv().is_err());
    }
}
