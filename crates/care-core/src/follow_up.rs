//! Keyword-matched follow-up questions drawn from the previous session.

use crate::types::ChatEntry;

/// Ordered keyword table. The first keyword found in the last input wins.
pub const FOLLOW_UPS: [(&str, &str); 6] = [
    (
        "exam",
        "Last time you mentioned feeling worried about your exams. How are you feeling about them now?",
    ),
    (
        "lonely",
        "Last time you shared that you were feeling lonely. How are things going with your connections now?",
    ),
    (
        "stress",
        "You mentioned feeling stressed last time. How are you managing that stress now?",
    ),
    (
        "sad",
        "You talked about feeling sad before. How are you feeling today?",
    ),
    (
        "anxious",
        "Last time you felt anxious. Are you still experiencing those feelings?",
    ),
    (
        "depressed",
        "You mentioned feeling depressed previously. How are you doing now?",
    ),
];

/// Follow-up question for the last stored exchange, if any keyword matches
pub fn follow_up_question(last: Option<&ChatEntry>) -> Option<&'static str> {
    let input = last?.user_input.to_lowercase();
    FOLLOW_UPS
        .iter()
        .find(|(keyword, _)| input.contains(*keyword))
        .map(|(_, question)| *question)
}
