//! Marker types tagging [`DateTimeOf`] values with the event they record.
//!
//! [`DateTimeOf`]: crate::DateTimeOf

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing the last modification of an entity.
#[derive(Clone, Copy, Debug)]
pub struct Modification;

/// Marker type describing a deadline.
#[derive(Clone, Copy, Debug)]
pub struct Deadline;
