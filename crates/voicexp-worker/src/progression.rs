//! Level progression applied when a reward lands.

use std::collections::BTreeMap;

use voicexp_core::types::id::RoleId;
use voicexp_entity::level::LevelRecord;

/// XP needed to advance from `level` to the next level:
/// `floor(100 × level^1.8)`.
pub fn xp_to_next_level(level: i32) -> i64 {
    (100.0 * f64::from(level.max(1)).powf(1.8)).floor() as i64
}

/// Result of crediting XP to a record.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelAward {
    /// Record after the award.
    pub record: LevelRecord,
    /// Level before the award.
    pub previous_level: i32,
    /// Role newly granted by this award, if any. Assigning it on the
    /// platform is up to the caller.
    pub new_role: Option<RoleId>,
}

impl LevelAward {
    pub fn leveled_up(&self) -> bool {
        self.record.level > self.previous_level
    }
}

/// Credit `amount` XP to `current`, rolling over levels and picking up the
/// role mapped to the highest level crossed.
///
/// A participant without any XP yet receives the level 1 role when one is
/// mapped.
pub fn apply_award(current: &LevelRecord, amount: i64, roles: &BTreeMap<i32, RoleId>) -> LevelAward {
    let is_new = current.xp == 0 && current.level == 1;
    let previous_level = current.level;

    let mut record = current.clone();
    record.xp += amount.max(0);
    while record.xp >= xp_to_next_level(record.level) {
        record.xp -= xp_to_next_level(record.level);
        record.level += 1;
    }

    let mut new_role = if record.level > previous_level {
        roles
            .range(previous_level + 1..=record.level)
            .next_back()
            .map(|(_, role)| *role)
    } else {
        None
    };
    if new_role.is_none() && is_new && current.last_role.is_none() {
        new_role = roles.get(&1).copied();
    }
    if let Some(role) = new_role {
        record.last_role = Some(role);
    }

    LevelAward {
        record,
        previous_level,
        new_role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_threshold_curve() {
        assert_eq!(xp_to_next_level(1), 100);
        assert_eq!(xp_to_next_level(2), 348);
        assert_eq!(xp_to_next_level(10), 6309);
    }

    #[test]
    fn test_award_rolls_over_levels() {
        let start = LevelRecord::starting(Utc::now(), None);
        let award = apply_award(&start, 500, &BTreeMap::new());
        // 500 - 100 (to level 2) - 348 (to level 3) = 52
        assert_eq!(award.record.level, 3);
        assert_eq!(award.record.xp, 52);
        assert!(award.leveled_up());
        assert_eq!(award.new_role, None);
    }

    #[test]
    fn test_highest_crossed_role_wins() {
        let mut roles = BTreeMap::new();
        roles.insert(2, RoleId::new(20));
        roles.insert(3, RoleId::new(30));
        roles.insert(5, RoleId::new(50));
        let mut start = LevelRecord::starting(Utc::now(), None);
        start.xp = 10;
        let award = apply_award(&start, 500, &roles);
        assert_eq!(award.record.level, 3);
        assert_eq!(award.new_role, Some(RoleId::new(30)));
        assert_eq!(award.record.last_role, Some(RoleId::new(30)));
    }

    #[test]
    fn test_new_member_gets_level_one_role() {
        let mut roles = BTreeMap::new();
        roles.insert(1, RoleId::new(10));
        let start = LevelRecord::starting(Utc::now(), None);
        let award = apply_award(&start, 5, &roles);
        assert_eq!(award.record.level, 1);
        assert_eq!(award.new_role, Some(RoleId::new(10)));

        let again = apply_award(&award.record, 5, &roles);
        assert_eq!(again.new_role, None);
        assert_eq!(again.record.last_role, Some(RoleId::new(10)));
    }
}
