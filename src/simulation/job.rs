use super::tasks::TaskKind;

/// Specialization assigned to an ant at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    Worker,
    Builder,
    Scout,
    Soldier,
}

impl Job {
    pub fn all() -> &'static [Job] {
        &[Job::Worker, Job::Builder, Job::Scout, Job::Soldier]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Job::Worker => "Worker",
            Job::Builder => "Builder",
            Job::Scout => "Scout",
            Job::Soldier => "Soldier",
        }
    }

    /// Which task kinds this job will claim from the queue. Soldiers claim
    /// nothing: they patrol and fight.
    pub fn can_perform(&self, kind: &TaskKind) -> bool {
        match (self, kind) {
            (Job::Worker, TaskKind::Gather { .. }) => true,
            (Job::Builder, TaskKind::Construct { .. }) => true,
            (Job::Builder, TaskKind::Gather { .. }) => true,
            (Job::Scout, TaskKind::Survey { .. }) => true,
            _ => false,
        }
    }

    pub fn carry_capacity(&self) -> usize {
        match self {
            Job::Worker => 8,
            Job::Builder => 4,
            Job::Scout => 2,
            Job::Soldier => 1,
        }
    }

    pub fn speed_modifier(&self) -> f32 {
        match self {
            Job::Scout => 1.3,
            Job::Soldier => 1.1,
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::ResourceKind;
    use glam::Vec2;

    fn gather() -> TaskKind {
        TaskKind::Gather {
            tile: (3, 4),
            resource: ResourceKind::Food,
        }
    }

    fn survey() -> TaskKind {
        TaskKind::Survey {
            target: Vec2::new(10.0, 10.0),
        }
    }

    #[test]
    fn workers_gather_but_do_not_scout() {
        assert!(Job::Worker.can_perform(&gather()));
        assert!(!Job::Worker.can_perform(&survey()));
    }

    #[test]
    fn builders_also_gather() {
        assert!(Job::Builder.can_perform(&gather()));
    }

    #[test]
    fn soldiers_claim_nothing() {
        assert!(!Job::Soldier.can_perform(&gather()));
        assert!(!Job::Soldier.can_perform(&survey()));
    }

    #[test]
    fn capacities_shrink_with_specialization() {
        assert!(Job::Worker.carry_capacity() > Job::Builder.carry_capacity());
        assert!(Job::Scout.carry_capacity() > Job::Soldier.carry_capacity());
        for job in Job::all() {
            assert!(job.carry_capacity() >= 1);
        }
    }
}
