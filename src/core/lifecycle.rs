//! Managed component lifecycle
//!
//! The contract a host container drives: components are started in ascending
//! phase order and stopped in descending order. Components that report
//! `is_auto_startup() == false` are left for the host to start explicitly.

/// Notified once a component has stopped
pub type StopCallback = Box<dyn FnOnce() + Send + 'static>;

/// A component with a start/stop lifecycle
pub trait Lifecycle: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start the component. Starting a running component is a no-op.
    fn start(&self) -> Result<(), Self::Error>;

    /// Stop the component, blocking until it has fully stopped.
    /// Stopping a stopped component is a no-op.
    fn stop(&self) -> Result<(), Self::Error>;

    /// Stop the component and run `callback` once it has stopped
    ///
    /// Components that can finish stopping asynchronously override this to
    /// defer the callback; the default stops, then calls back.
    fn stop_then(&self, callback: StopCallback) -> Result<(), Self::Error> {
        let result = self.stop();
        callback();
        result
    }

    fn is_running(&self) -> bool;

    fn is_auto_startup(&self) -> bool {
        true
    }

    fn phase(&self) -> i32 {
        0
    }
}

/// Start every auto-startup component in ascending phase order
///
/// Stops at the first failure and returns it; components started before the
/// failure are left running for the caller to stop.
pub fn start_all<E>(components: &[&dyn Lifecycle<Error = E>]) -> Result<(), E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let mut ordered: Vec<_> = components
        .iter()
        .filter(|component| component.is_auto_startup())
        .collect();
    ordered.sort_by_key(|component| component.phase());
    for component in ordered {
        component.start()?;
    }
    Ok(())
}

/// Stop every running component in descending phase order
///
/// Every component is given the chance to stop; the first error is returned.
pub fn stop_all<E>(components: &[&dyn Lifecycle<Error = E>]) -> Result<(), E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let mut ordered: Vec<_> = components.iter().collect();
    ordered.sort_by_key(|component| std::cmp::Reverse(component.phase()));

    let mut first_error = None;
    for component in ordered {
        if !component.is_running() {
            continue;
        }
        if let Err(e) = component.stop() {
            log::warn!("Component failed to stop cleanly: {}", e);
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
