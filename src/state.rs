//! Shared "active" flag for the portal loops.
//!
//! The controller owns the [`PortalState`]; each loop gets its own
//! [`ActiveFlag`] at launch. The flag doubles as a cancellation signal so a
//! loop parked in `recv`/`accept` wakes up as soon as the portal stops.

use tokio::sync::watch;

/// Writer side of the active flag, held by the controller.
#[derive(Debug)]
pub struct PortalState {
    active: watch::Sender<bool>,
}

impl PortalState {
    /// Create an inactive state.
    pub fn new() -> Self {
        let (active, _) = watch::channel(false);
        Self { active }
    }

    pub fn activate(&self) {
        self.active.send_replace(true);
    }

    /// Clear the flag, returning whether it was set.
    pub fn deactivate(&self) -> bool {
        self.active.send_replace(false)
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Reader handle for a loop task.
    pub fn subscribe(&self) -> ActiveFlag {
        ActiveFlag {
            rx: self.active.subscribe(),
        }
    }
}

impl Default for PortalState {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader side of the active flag, held by a loop task.
#[derive(Debug, Clone)]
pub struct ActiveFlag {
    rx: watch::Receiver<bool>,
}

impl ActiveFlag {
    pub fn is_active(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is cleared or the controller is gone.
    pub async fn cleared(&mut self) {
        let _ = self.rx.wait_for(|active| !*active).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_inactive() {
        let state = PortalState::new();

        assert!(!state.is_active());
        assert!(!state.subscribe().is_active());
    }

    #[test]
    fn deactivate_is_idempotent() {
        let state = PortalState::new();
        state.activate();

        assert!(state.deactivate());
        assert!(!state.is_active());
        assert!(!state.deactivate());
        assert!(!state.is_active());
    }

    #[tokio::test]
    async fn cleared_wakes_waiting_loop() {
        let state = PortalState::new();
        state.activate();
        let mut flag = state.subscribe();
        assert!(flag.is_active());

        let waiter = tokio::spawn(async move {
            flag.cleared().await;
            flag.is_active()
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        state.deactivate();

        let still_active = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!still_active);
    }

    #[tokio::test]
    async fn cleared_returns_immediately_when_already_inactive() {
        let state = PortalState::new();
        let mut flag = state.subscribe();

        tokio::time::timeout(Duration::from_millis(100), flag.cleared())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cleared_returns_when_controller_dropped() {
        let state = PortalState::new();
        state.activate();
        let mut flag = state.subscribe();
        drop(state);

        tokio::time::timeout(Duration::from_millis(100), flag.cleared())
            .await
            .unwrap();
    }
}
