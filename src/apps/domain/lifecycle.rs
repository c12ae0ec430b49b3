//! Instance lifecycle as observed from module loader events.

use super::{AppDomainError, AppId, InstanceId, ParseInstanceLifecycleError};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state of an application instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceLifecycle {
    /// The loader is launching the instance.
    Starting,
    /// The instance is up and may take part in interop.
    Running,
    /// The instance has exited.
    Stopped,
}

impl InstanceLifecycle {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }

    /// Returns whether `self -> target` is a legal edge.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Starting, Self::Running | Self::Stopped) | (Self::Running, Self::Stopped)
        )
    }
}

impl fmt::Display for InstanceLifecycle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for InstanceLifecycle {
    type Error = ParseInstanceLifecycleError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "starting" => Ok(Self::Starting),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            other => Err(ParseInstanceLifecycleError(other.to_owned())),
        }
    }
}

/// A module instance as reported by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInstance {
    /// FDC3 instance identifier.
    pub instance_id: InstanceId,
    /// Application the instance runs.
    pub app_id: AppId,
    /// Startup parameters the instance was launched with.
    pub parameters: BTreeMap<String, String>,
}

/// Kind of lifecycle transition reported by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifetimeEventKind {
    /// Launch began.
    Starting,
    /// Launch finished; the instance is running.
    Started,
    /// Shutdown began.
    Stopping,
    /// The instance exited.
    Stopped,
}

/// A lifecycle notification from the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifetimeEvent {
    /// What happened.
    pub kind: LifetimeEventKind,
    /// Instance it happened to.
    pub instance: ModuleInstance,
}

impl LifetimeEvent {
    /// Creates an event.
    #[must_use]
    pub const fn new(kind: LifetimeEventKind, instance: ModuleInstance) -> Self {
        Self { kind, instance }
    }
}

/// A tracked application instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInstance {
    instance_id: InstanceId,
    app_id: AppId,
    state: InstanceLifecycle,
}

impl AppInstance {
    /// Creates a tracked instance in the `Starting` state.
    #[must_use]
    pub const fn starting(instance_id: InstanceId, app_id: AppId) -> Self {
        Self {
            instance_id,
            app_id,
            state: InstanceLifecycle::Starting,
        }
    }

    /// Returns the instance identifier.
    #[must_use]
    pub const fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Returns the application identifier.
    #[must_use]
    pub const fn app_id(&self) -> &AppId {
        &self.app_id
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> InstanceLifecycle {
        self.state
    }

    /// Moves the instance to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`AppDomainError::InvalidLifecycleTransition`] for illegal
    /// edges.
    pub fn transition_to(&mut self, target: InstanceLifecycle) -> Result<(), AppDomainError> {
        if !self.state.can_transition_to(target) {
            return Err(AppDomainError::InvalidLifecycleTransition {
                from: self.state.as_str().to_owned(),
                to: target.as_str().to_owned(),
            });
        }
        self.state = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(InstanceLifecycle::Starting, InstanceLifecycle::Running, true)]
    #[case(InstanceLifecycle::Starting, InstanceLifecycle::Stopped, true)]
    #[case(InstanceLifecycle::Running, InstanceLifecycle::Stopped, true)]
    #[case(InstanceLifecycle::Running, InstanceLifecycle::Starting, false)]
    #[case(InstanceLifecycle::Stopped, InstanceLifecycle::Running, false)]
    fn lifecycle_edges(
        #[case] from: InstanceLifecycle,
        #[case] to: InstanceLifecycle,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[rstest]
    #[case("starting", InstanceLifecycle::Starting)]
    #[case("running", InstanceLifecycle::Running)]
    #[case("stopped", InstanceLifecycle::Stopped)]
    fn lifecycle_parses_canonical_names(#[case] raw: &str, #[case] expected: InstanceLifecycle) {
        assert_eq!(InstanceLifecycle::try_from(raw), Ok(expected));
        assert_eq!(expected.as_str(), raw);
    }

    #[rstest]
    fn stopped_instance_cannot_restart() {
        let app_id = AppId::new("chart").expect("valid app id");
        let mut instance = AppInstance::starting(InstanceId::new(), app_id);
        instance
            .transition_to(InstanceLifecycle::Stopped)
            .expect("starting -> stopped");

        let result = instance.transition_to(InstanceLifecycle::Running);

        assert!(matches!(
            result,
            Err(AppDomainError::InvalidLifecycleTransition { .. })
        ));
    }
}
