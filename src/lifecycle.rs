use serde::Serialize;

/// Asynchronous notifications a resource reports about itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ResourceEvent {
    /// Duration became known, in seconds.
    Metadata { duration: f64 },
    /// Enough is buffered to play through.
    CanPlayThrough,
    /// Playback position, in seconds.
    Progress { position: f64 },
    Ended,
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum ResourceState {
    #[default]
    Idle,
    Loading,
    Ready,
    Ended,
    Errored,
}

impl ResourceState {
    /// Seeking an ended resource makes it playable again.
    pub fn rewound(self) -> Self {
        match self {
            Self::Ended => Self::Ready,
            other => other,
        }
    }
}

/// The single transition table for a resource.
///
/// `None` means the event is not legal in `state` and must be dropped. Readiness is
/// accepted once, and nothing is accepted after a terminal state.
pub fn transition(state: ResourceState, event: &ResourceEvent) -> Option<ResourceState> {
    use ResourceEvent as E;
    use ResourceState as S;

    match (state, event) {
        (S::Loading, E::Metadata { .. }) => Some(S::Loading),
        (S::Loading, E::CanPlayThrough) => Some(S::Ready),
        (S::Loading, E::Failed { .. }) => Some(S::Errored),
        (S::Ready, E::Metadata { .. } | E::Progress { .. }) => Some(S::Ready),
        (S::Ready, E::Ended) => Some(S::Ended),
        (S::Ready, E::Failed { .. }) => Some(S::Errored),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_fires_once() {
        let ready = transition(ResourceState::Loading, &ResourceEvent::CanPlayThrough);
        assert_eq!(ready, Some(ResourceState::Ready));
        assert_eq!(transition(ResourceState::Ready, &ResourceEvent::CanPlayThrough), None);
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let events = [
            ResourceEvent::Metadata { duration: 1.0 },
            ResourceEvent::CanPlayThrough,
            ResourceEvent::Progress { position: 1.0 },
            ResourceEvent::Ended,
            ResourceEvent::Failed {
                reason: String::from("late"),
            },
        ];
        for state in [ResourceState::Ended, ResourceState::Errored, ResourceState::Idle] {
            for event in &events {
                assert_eq!(transition(state, event), None, "{state:?} accepted {event:?}");
            }
        }
    }

    #[test]
    fn progress_before_ready_is_dropped() {
        let event = ResourceEvent::Progress { position: 2.0 };
        assert_eq!(transition(ResourceState::Loading, &event), None);
    }

    #[test]
    fn loading_can_fail() {
        let event = ResourceEvent::Failed {
            reason: String::from("404"),
        };
        assert_eq!(
            transition(ResourceState::Loading, &event),
            Some(ResourceState::Errored)
        );
    }

    #[test]
    fn ended_rewinds_to_ready() {
        assert_eq!(ResourceState::Ended.rewound(), ResourceState::Ready);
        assert_eq!(ResourceState::Errored.rewound(), ResourceState::Errored);
    }
}
