/// Wire contract shared by the ember client crates: events exchanged with
/// the room server, their payloads, and the text packet framing they
/// travel in.
pub mod events;
pub mod frame;
pub mod models;
