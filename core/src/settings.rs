/// When the hub drops handles whose observer has been deallocated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrunePolicy {
    /// Remove absent handles at the start of every dispatch.
    #[default]
    OnDispatch,
    /// Only remove absent handles on `prune` or `unsubscribe`.
    Manual,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HubSettings {
    pub prune_policy: PrunePolicy,
}

impl HubSettings {
    pub fn with_prune_policy(prune_policy: PrunePolicy) -> Self {
        Self { prune_policy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prunes_on_dispatch() {
        assert_eq!(HubSettings::default().prune_policy, PrunePolicy::OnDispatch);
        assert_eq!(
            HubSettings::with_prune_policy(PrunePolicy::Manual).prune_policy,
            PrunePolicy::Manual
        );
    }
}
