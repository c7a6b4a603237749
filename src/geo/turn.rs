/// Keywords whose presence marks an instruction as a maneuver.
const MANEUVER_KEYWORDS: [&str; 7] = ["turn", "left", "right", "exit", "ramp", "merge", "fork"];

const UTURN_PHRASES: [&str; 4] = ["u-turn", "uturn", "u turn", "make a u"];

/// Coarse direction of a maneuver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDirection {
    /// Turn or bear to the left.
    Left,
    /// Turn or bear to the right.
    Right,
    /// Keep going; also the fallback when nothing else matches.
    Straight,
    /// Reverse direction.
    Uturn,
}

/// Heuristic maneuver detection over free-text provider instructions.
///
/// True iff the cleaned, lower-cased text contains any maneuver keyword. Word boundaries are not
/// considered, so false positives are possible (e.g. "Copyright Rd").
pub fn is_maneuver(instruction: &str) -> bool {
    let text = clean_instruction(instruction).to_lowercase();
    MANEUVER_KEYWORDS.iter().any(|k| text.contains(k))
}

/// Priority-ordered direction classification; the first matching rule wins.
///
/// 1. u-turn phrasing
/// 2. "turn left" / "left onto"
/// 3. "turn right" / "right onto"
/// 4. "continue" / "straight"
/// 5. bare "left" / "right"
/// 6. otherwise straight
pub fn classify_direction(instruction: &str) -> TurnDirection {
    let text = clean_instruction(instruction).to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if has(&UTURN_PHRASES) {
        TurnDirection::Uturn
    } else if has(&["turn left", "left onto"]) {
        TurnDirection::Left
    } else if has(&["turn right", "right onto"]) {
        TurnDirection::Right
    } else if has(&["continue", "straight"]) {
        TurnDirection::Straight
    } else if text.contains("left") {
        TurnDirection::Left
    } else if text.contains("right") {
        TurnDirection::Right
    } else {
        TurnDirection::Straight
    }
}

/// Strip HTML markup from a provider instruction and collapse whitespace.
///
/// Tags are replaced by a space so `"Turn <b>left</b>onto"` keeps its words apart. Only the
/// entities providers commonly emit are decoded.
pub fn clean_instruction(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[path = "../../tests/unit/geo/turn.rs"]
mod tests;
