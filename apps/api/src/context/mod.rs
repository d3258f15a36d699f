// Attachment intake and segment composition.
// Everything sent to the generation service is assembled here as an ordered
// segment list; nothing in this module performs network calls.

pub mod composer;
pub mod handlers;
pub mod ingest;
pub mod models;
