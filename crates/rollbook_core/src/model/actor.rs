//! Acting-user identity and capability for enrollment authorization.
//!
//! The session collaborator resolves a request to an [`Actor`] and passes it
//! into service calls explicitly; core never reads identity from ambient
//! state. For teachers, the collaborator stamps the owned-course set from
//! directory data at actor build time.

use crate::model::course::CourseId;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable identifier for an account in the external user store.
pub type UserId = Uuid;

/// Capability tag carried by an acting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Full administrative rights over the directory and all rosters.
    Admin,
    /// Teaching staff; may write only rosters of the courses they own.
    Teacher {
        /// Courses owned by this teacher, stamped at actor build time.
        owned_courses: BTreeSet<CourseId>,
    },
    /// Enrolled learner; never authorized for roster writes.
    Student,
    /// Guardian account; never authorized for roster writes.
    Parent,
}

impl Capability {
    /// Stable lowercase label used in log lines and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher { .. } => "teacher",
            Self::Student => "student",
            Self::Parent => "parent",
        }
    }
}

/// Acting user passed explicitly into every service operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Account identity in the external user store.
    pub user_id: UserId,
    /// Capability resolved by the session collaborator.
    pub capability: Capability,
}

impl Actor {
    /// Builds an administrator actor.
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            capability: Capability::Admin,
        }
    }

    /// Builds a teacher actor with its owned-course set.
    pub fn teacher(user_id: UserId, owned_courses: impl IntoIterator<Item = CourseId>) -> Self {
        Self {
            user_id,
            capability: Capability::Teacher {
                owned_courses: owned_courses.into_iter().collect(),
            },
        }
    }

    /// Builds a student actor.
    pub fn student(user_id: UserId) -> Self {
        Self {
            user_id,
            capability: Capability::Student,
        }
    }

    /// Builds a parent/guardian actor.
    pub fn parent(user_id: UserId) -> Self {
        Self {
            user_id,
            capability: Capability::Parent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Actor, Capability};
    use uuid::Uuid;

    #[test]
    fn labels_are_stable_lowercase_ids() {
        assert_eq!(Capability::Admin.label(), "admin");
        assert_eq!(
            Actor::teacher(Uuid::new_v4(), []).capability.label(),
            "teacher"
        );
        assert_eq!(Capability::Student.label(), "student");
        assert_eq!(Capability::Parent.label(), "parent");
    }

    #[test]
    fn teacher_owned_set_deduplicates() {
        let course = Uuid::new_v4();
        let actor = Actor::teacher(Uuid::new_v4(), [course, course]);
        match actor.capability {
            Capability::Teacher { owned_courses } => {
                assert_eq!(owned_courses.len(), 1);
                assert!(owned_courses.contains(&course));
            }
            other => panic!("unexpected capability: {other:?}"),
        }
    }
}
