//! DoorAgent command handling and outbound publishing

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::sync::{broadcast, mpsc};
    use voxel_doors::{
        activity::ActivityRegistry,
        archetype::{ArchetypeRegistry, Portcullis},
        autoclose::AutoCloseScheduler,
        block::BlockState,
        bus::{DoorAgent, DoorAgentConfig, Outbound, Published},
        events::EventBus,
        orchestrator::{Collaborators, ToggleOrchestrator},
        protocol::{subjects, DoorEvent, OutcomeMsg, OutcomeStatus},
        service::DoorService,
        structure::{MemoryStore, Structure},
        types::{Cuboid, Direction, DoorServiceConfig, DoorStats, PlayerId, StructureId, Vec3i},
        world::{AllowAll, DefaultClassifier, MemoryWorld},
    };

    struct Setup {
        agent: DoorAgent,
        service: Arc<Mutex<DoorService>>,
        world: Arc<MemoryWorld>,
        published: broadcast::Receiver<Published>,
    }

    fn setup() -> Setup {
        let config = DoorServiceConfig {
            session: "test".into(),
            ..Default::default()
        };
        let world = Arc::new(MemoryWorld::new());
        let store = Arc::new(MemoryStore::new());

        let gate = Structure::new(
            StructureId(1),
            Portcullis::NAME,
            Cuboid::new(Vec3i::new(0, 0, 0), Vec3i::new(2, 2, 0)),
            Vec3i::ZERO,
            Direction::Up,
            PlayerId::new("alice"),
        );
        world.fill(gate.cuboid, &BlockState::new("iron_bars"));
        store.insert(gate);

        let classifier = Arc::new(DefaultClassifier::from_config(&config));
        let service = DoorService::new(config.clone(), world.clone(), classifier);
        let movers = service.queue();
        let service = Arc::new(Mutex::new(service));

        let (tx, rx) = mpsc::unbounded_channel();
        let outbound = Outbound::new(config.session.clone(), 64);
        let published = outbound.subscribe();
        let events = Arc::new(EventBus::new());
        events.subscribe(Arc::new(outbound.clone()));

        let orchestrator = Arc::new(ToggleOrchestrator::new(
            config,
            Collaborators {
                archetypes: Arc::new(ArchetypeRegistry::with_builtin()),
                store,
                world: world.clone(),
                authorization: Arc::new(AllowAll),
                events,
                activity: Arc::new(ActivityRegistry::new()),
                auto_close: Arc::new(AutoCloseScheduler::new(tx)),
                movers,
            },
        ));

        let agent = DoorAgent::new(
            DoorAgentConfig::default(),
            Arc::clone(&service),
            orchestrator,
            rx,
            outbound,
        );
        Setup {
            agent,
            service,
            world,
            published,
        }
    }

    #[tokio::test]
    async fn stats_command_replies_with_door_stats() {
        let s = setup();
        s.service.lock().tick();

        let reply = s.agent.handle_command(subjects::CMD_STATS, b"").unwrap();
        let stats: DoorStats = serde_json::from_slice(&reply).unwrap();
        assert_eq!(stats.total_ticks, 1);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn abort_command_reports_whether_anything_was_running() {
        let s = setup();
        let reply = s
            .agent
            .handle_command(subjects::CMD_ABORT, br#"{"structure_id": 1}"#)
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&reply).unwrap();
        assert_eq!(value["aborted"], false);
    }

    #[tokio::test]
    async fn unknown_subjects_and_bad_payloads_are_errors() {
        let s = setup();
        assert!(s.agent.handle_command("doors.cmd.teleport", b"").is_err());
        assert!(s.agent.handle_command(subjects::REQUEST, b"not json").is_err());
    }

    #[tokio::test]
    async fn request_publishes_lifecycle_and_outcome() {
        let mut s = setup();
        let request = br#"{
            "selector": {"one": 1},
            "cause": "signal",
            "action": "toggle",
            "skip_animation": true
        }"#;
        let reply = s.agent.handle_command(subjects::REQUEST, request).unwrap();
        assert_eq!(&reply[..], br#"{"accepted":true}"#);

        let mut subjects_seen = Vec::new();
        let mut outcome = None;
        for _ in 0..1000 {
            tokio::task::yield_now().await;
            s.service.lock().tick();
            while let Ok(msg) = s.published.try_recv() {
                subjects_seen.push(msg.subject);
                if msg.subject == subjects::OUTCOME {
                    let event: DoorEvent<OutcomeMsg> = serde_json::from_slice(&msg.payload).unwrap();
                    outcome = Some(event);
                }
            }
            if outcome.is_some() {
                break;
            }
        }

        assert_eq!(
            subjects_seen,
            vec![subjects::TOGGLE_START, subjects::TOGGLE_END, subjects::OUTCOME]
        );
        let event = outcome.expect("outcome published");
        assert_eq!(event.session, "test");
        assert_eq!(event.payload.structure_id, StructureId(1));
        assert_eq!(event.payload.status, OutcomeStatus::Completed);
        assert_eq!(event.payload.is_open, Some(true));
        assert_eq!(
            s.world
                .blocks_in(Cuboid::new(Vec3i::new(0, 3, 0), Vec3i::new(2, 5, 0)))
                .len(),
            9
        );
    }
}
