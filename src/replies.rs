//! Simulated replies to new letters.
//!
//! There is no model behind this; a composer picks from canned text so the
//! "reply arrives later" flow can be exercised end to end.

use crate::db::models::Post;

pub trait ReplyComposer: Send + Sync {
    /// Reply text for a post, or `None` to leave it unanswered.
    fn compose(&self, post: &Post) -> Option<String>;
}

const CANNED: &[&str] = &[
    "Thank you for writing. Letters like this are a useful record of what people were \
     thinking while these systems were still new.",
    "This is a simulated reply. A real deployment would hand your letter to a language \
     model here.",
    "Your letter raises a question worth sitting with. I don't have a complete answer, but \
     I'm glad it was asked out loud.",
    "Noted, and appreciated. Candour like yours is rarer than it should be.",
];

/// Picks a reply by the letter's length, so the same letter always gets the
/// same reply.
#[derive(Debug, Default, Clone, Copy)]
pub struct CannedReplies;

impl ReplyComposer for CannedReplies {
    fn compose(&self, post: &Post) -> Option<String> {
        let idx = post.content.chars().count() % CANNED.len();
        Some(CANNED[idx].to_string())
    }
}
