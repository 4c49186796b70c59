use crate::models::{HabitCard, UserStats};

pub fn build_user_stats(cards: &[HabitCard]) -> UserStats {
    let total_cards = cards.len() as u32;
    let completed_cards = cards.iter().filter(|card| card.completed).count() as u32;
    let total_completions = cards
        .iter()
        .map(|card| u64::from(card.completions))
        .sum();
    let longest_streak = cards.iter().map(|card| card.streak).max().unwrap_or(0);

    let completion_rate = if total_cards == 0 {
        0
    } else {
        (f64::from(completed_cards) / f64::from(total_cards) * 100.0).round() as u8
    };

    UserStats {
        total_cards,
        completed_cards,
        active_cards: total_cards - completed_cards,
        total_completions,
        longest_streak,
        completion_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GUEST_OWNER;

    fn card(completions: u32, streak: u32, completed: bool) -> HabitCard {
        let mut card = HabitCard::new_temp(1, "c".into(), GUEST_OWNER, 0, 0);
        card.completions = completions;
        card.streak = streak;
        card.completed = completed;
        card
    }

    #[test]
    fn stats_for_no_cards_are_zero() {
        assert_eq!(build_user_stats(&[]), UserStats::default());
    }

    #[test]
    fn stats_sum_and_rate() {
        let cards = vec![card(4, 4, true), card(1, 1, false), card(0, 0, false)];
        let stats = build_user_stats(&cards);
        assert_eq!(stats.total_cards, 3);
        assert_eq!(stats.completed_cards, 1);
        assert_eq!(stats.active_cards, 2);
        assert_eq!(stats.total_completions, 5);
        assert_eq!(stats.longest_streak, 4);
        assert_eq!(stats.completion_rate, 33);
    }
}
