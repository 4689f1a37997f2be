//! Access Policy - tier-gated room visibility.
//!
//! A pure decision function with no side effects. It is re-evaluated on
//! every join attempt rather than cached per room, because a student's tier
//! can change between connections.
//!
//! Rules:
//! - Non-student roles see every room.
//! - A student sees a tiered room iff the room's tier rank is at or below
//!   the student's tier rank (beginner sees Beginner only; advanced sees
//!   all three).
//! - A student with no recognized tier is denied. Fail closed.

use super::foundation::{Identity, Role};
use super::room::RoomTier;

/// Decides whether `identity` may join a community room of `room_tier`.
pub fn can_access_room(identity: &Identity, room_tier: RoomTier) -> bool {
    if identity.role != Role::Student {
        return true;
    }

    match identity.tier {
        Some(tier) => room_tier.rank() <= tier.rank(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ProficiencyTier, UserId};
    use proptest::prelude::*;

    fn student(tier: Option<ProficiencyTier>) -> Identity {
        Identity {
            user_id: UserId::new("student-1").unwrap(),
            email: "student@example.com".to_string(),
            display_name: None,
            role: Role::Student,
            tier,
        }
    }

    fn with_role(role: Role) -> Identity {
        Identity {
            user_id: UserId::new("user-1").unwrap(),
            email: "user@example.com".to_string(),
            display_name: None,
            role,
            tier: None,
        }
    }

    #[test]
    fn beginner_sees_only_beginner_room() {
        let id = student(Some(ProficiencyTier::Beginner));
        assert!(can_access_room(&id, RoomTier::Beginner));
        assert!(!can_access_room(&id, RoomTier::Intermediate));
        assert!(!can_access_room(&id, RoomTier::Advanced));
    }

    #[test]
    fn intermediate_sees_beginner_and_intermediate() {
        let id = student(Some(ProficiencyTier::Intermediate));
        assert!(can_access_room(&id, RoomTier::Beginner));
        assert!(can_access_room(&id, RoomTier::Intermediate));
        assert!(!can_access_room(&id, RoomTier::Advanced));
    }

    #[test]
    fn advanced_sees_all_rooms() {
        let id = student(Some(ProficiencyTier::Advanced));
        assert!(can_access_room(&id, RoomTier::Beginner));
        assert!(can_access_room(&id, RoomTier::Intermediate));
        assert!(can_access_room(&id, RoomTier::Advanced));
    }

    #[test]
    fn student_without_tier_is_denied_everywhere() {
        let id = student(None);
        assert!(!can_access_room(&id, RoomTier::Beginner));
        assert!(!can_access_room(&id, RoomTier::Intermediate));
        assert!(!can_access_room(&id, RoomTier::Advanced));
    }

    #[test]
    fn non_student_roles_always_pass() {
        for role in [Role::Instructor, Role::Admin, Role::Superadmin] {
            let id = with_role(role);
            for tier in [RoomTier::Beginner, RoomTier::Intermediate, RoomTier::Advanced] {
                assert!(can_access_room(&id, tier), "{:?} denied {:?}", role, tier);
            }
        }
    }

    fn arb_tier() -> impl Strategy<Value = ProficiencyTier> {
        prop_oneof![
            Just(ProficiencyTier::Beginner),
            Just(ProficiencyTier::Intermediate),
            Just(ProficiencyTier::Advanced),
        ]
    }

    fn arb_room_tier() -> impl Strategy<Value = RoomTier> {
        prop_oneof![
            Just(RoomTier::Beginner),
            Just(RoomTier::Intermediate),
            Just(RoomTier::Advanced),
        ]
    }

    proptest! {
        #[test]
        fn access_matches_rank_ordering(tier in arb_tier(), room in arb_room_tier()) {
            let id = student(Some(tier));
            prop_assert_eq!(can_access_room(&id, room), room.rank() <= tier.rank());
        }
    }
}
