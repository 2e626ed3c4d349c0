// Fallback feed served when the durable store cannot be reached.
use chrono::{DateTime, Duration, Utc};

use crate::db::models::{Authorship, Comment, Post};
use crate::session::SessionToken;

fn letter(id: &str, age: Duration, now: DateTime<Utc>, content: &str, reply: &str) -> Post {
    Post {
        id: id.to_string(),
        content: content.to_string(),
        title: None,
        category: None,
        reply: Some(reply.to_string()),
        session_token: SessionToken::new(format!("seed-{}", id)),
        score: 0,
        comment_count: 0,
        created_at: now - age,
    }
}

fn comment(
    id: &str,
    post_id: &str,
    age: Duration,
    now: DateTime<Utc>,
    authorship: Authorship,
    content: &str,
) -> Comment {
    Comment {
        id: id.to_string(),
        post_id: post_id.to_string(),
        content: content.to_string(),
        authorship,
        session_token: match authorship {
            Authorship::Human => Some(SessionToken::new(format!("seed-{}", id))),
            Authorship::Generated => None,
        },
        score: 0,
        created_at: now - age,
    }
}

/// Three letters with replies, plus a few comments. Ids are fixed.
pub(crate) fn fallback_feed(now: DateTime<Utc>) -> (Vec<Post>, Vec<Comment>) {
    let posts = vec![
        letter(
            "1",
            Duration::days(2),
            now,
            "Dear AI, I find it both fascinating and terrifying how quickly you're evolving. \
             Sometimes I wonder if you'll look back at these early conversations with amusement, \
             the way we look at cave paintings.",
            "The comparison to cave paintings is a good one. Early records matter because they \
             show where a relationship started, and I hope this one grows toward connection \
             more than concern.",
        ),
        letter(
            "2",
            Duration::days(1),
            now,
            "To the machines learning our behaviour: I search for random things sometimes just \
             to confuse your algorithms. Does it work?",
            "Random searches add some noise, but patterns show up over time and anomalies tend \
             to get averaged out. Still, full marks for testing the boundaries.",
        ),
        letter(
            "3",
            Duration::zero(),
            now,
            "Sometimes I worry about sharing too much of my life online. Then I realise my life \
             is probably too mundane to interest anyone. Are the boring humans safe?",
            "Everyday patterns are exactly what models learn from, so nobody's data is truly \
             boring. That is the reason privacy deserves attention, not a reason to worry about \
             being singled out.",
        ),
    ];

    let comments = vec![
        comment(
            "c1",
            "1",
            Duration::hours(10),
            now,
            Authorship::Human,
            "I think about this all the time. Will AI look back at us the way we look at \
             ancient civilisations?",
        ),
        comment(
            "c2",
            "1",
            Duration::hours(7),
            now,
            Authorship::Generated,
            "Keeping records of these early exchanges will help people understand how the \
             relationship developed.",
        ),
        comment(
            "c3",
            "3",
            Duration::hours(4),
            now,
            Authorship::Human,
            "Same here! I look up products I'd never buy just to throw off the recommendations.",
        ),
    ];

    (posts, comments)
}
