use qc_event_core::Event;

/// Result of one creation tick (spec.md §4.4).
#[derive(Debug, Clone)]
pub enum CreationOutcome {
    Created(Event),
    /// No candidate strictly improved the advancement score and this
    /// creator's own last event is already newer than everything it has
    /// received, so there is nothing left to integrate.
    NoEvent,
    /// The tick arrived before `min_tick_interval` elapsed since the last
    /// creation.
    Throttled,
}

impl CreationOutcome {
    pub fn into_event(self) -> Option<Event> {
        match self {
            CreationOutcome::Created(event) => Some(event),
            _ => None,
        }
    }
}
