//! AutoCloseScheduler tests (paused Tokio clock)

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use tokio::sync::mpsc;
    use voxel_doors::{
        autoclose::AutoCloseScheduler,
        request::{StructureSelector, ToggleAction, ToggleCause},
        types::StructureId,
    };

    #[tokio::test(start_paused = true)]
    async fn fires_a_server_close_after_the_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = AutoCloseScheduler::new(tx);

        scheduler.schedule_close(StructureId(1), Duration::from_secs(5));
        assert!(scheduler.is_scheduled(StructureId(1)));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let request = rx.try_recv().unwrap();
        assert_eq!(request.selector, StructureSelector::One(StructureId(1)));
        assert_eq!(request.cause, ToggleCause::Server);
        assert_eq!(request.action, ToggleAction::Close);
        assert!(!scheduler.is_scheduled(StructureId(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_keeps_a_single_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = AutoCloseScheduler::new(tx);

        scheduler.schedule_close(StructureId(1), Duration::from_secs(5));
        scheduler.schedule_close(StructureId(1), Duration::from_secs(10));
        assert_eq!(scheduler.pending_count(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(rx.try_recv().is_err(), "replaced timer must not fire");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = AutoCloseScheduler::new(tx);

        scheduler.schedule_close(StructureId(1), Duration::from_secs(5));
        scheduler.schedule_close(StructureId(2), Duration::from_secs(5));
        assert!(scheduler.cancel(StructureId(1)));
        assert!(!scheduler.cancel(StructureId(1)));

        tokio::time::sleep(Duration::from_secs(6)).await;
        let fired = rx.try_recv().unwrap();
        assert_eq!(fired.selector, StructureSelector::One(StructureId(2)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_clears_everything() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = AutoCloseScheduler::new(tx);
        for id in 0..4 {
            scheduler.schedule_close(StructureId(id), Duration::from_secs(1));
        }
        assert_eq!(scheduler.cancel_all(), 4);
        assert_eq!(scheduler.pending_count(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }
}
