// Position text -> archetype.

use crate::model::Archetype;

/// Classify free-form position text.
///
/// Tokens are split on commas and the word "and". A lone "pitcher" token is a
/// pitcher; "pitcher" alongside any other position is two-way; everything
/// else, including empty text, is a position player.
pub fn classify(position: &str) -> Archetype {
    let lowered = position.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(',')
        .flat_map(|part| part.split(" and "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    let has_pitcher = tokens.iter().any(|t| *t == "pitcher");
    match (has_pitcher, tokens.len()) {
        (true, 1) => Archetype::Pitcher,
        (true, _) => Archetype::TwoWay,
        _ => Archetype::PositionPlayer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_pitcher() {
        assert_eq!(classify("Pitcher"), Archetype::Pitcher);
        assert_eq!(classify("  pitcher "), Archetype::Pitcher);
    }

    #[test]
    fn pitcher_plus_position_is_two_way() {
        assert_eq!(classify("Pitcher, First Baseman"), Archetype::TwoWay);
        assert_eq!(classify("Pitcher and Designated Hitter"), Archetype::TwoWay);
        assert_eq!(classify("Pitcher, Designated Hitter"), Archetype::TwoWay);
    }

    #[test]
    fn everything_else_is_a_position_player() {
        assert_eq!(classify(""), Archetype::PositionPlayer);
        assert_eq!(classify("Catcher"), Archetype::PositionPlayer);
        assert_eq!(classify("Shortstop, Second Baseman"), Archetype::PositionPlayer);
        // Substring matches do not count.
        assert_eq!(classify("Relief Pitcher"), Archetype::PositionPlayer);
    }

    #[test]
    fn empty_tokens_are_ignored() {
        assert_eq!(classify("Pitcher, ,"), Archetype::Pitcher);
    }
}
