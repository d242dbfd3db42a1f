use std::collections::HashMap;

use strand_core::model::Command;

use crate::error::{Result, SchedError};

/// A command plus its workflow-local dependency edges, keyed by caller-chosen
/// names. Turned into real backend ids at submission time.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub key: String,
    pub command: Command,
    pub parents: Vec<String>,
}

impl JobRequest {
    pub fn new(key: impl Into<String>, command: Command) -> Self {
        JobRequest {
            key: key.into(),
            command,
            parents: Vec::new(),
        }
    }

    pub fn after(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }
}

/// Orders requests so every parent precedes its children, as indices into the
/// input slice. Unknown parents and cycles are rejected here, before anything
/// reaches a backend.
pub fn plan_submission_order(requests: &[JobRequest]) -> Result<Vec<usize>> {
    let index_by_key: HashMap<&str, usize> = requests
        .iter()
        .enumerate()
        .map(|(i, r)| (r.key.as_str(), i))
        .collect();

    for request in requests {
        for parent in &request.parents {
            if !index_by_key.contains_key(parent.as_str()) {
                return Err(SchedError::UnknownDependency {
                    child: request.key.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }

    // Kahn's algorithm; ties resolved by input order so plans are stable.
    let mut indegree = vec![0usize; requests.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); requests.len()];
    for (i, request) in requests.iter().enumerate() {
        for parent in &request.parents {
            if let Some(&p) = index_by_key.get(parent.as_str()) {
                indegree[i] += 1;
                children[p].push(i);
            }
        }
    }

    let mut ready: Vec<usize> = (0..requests.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(requests.len());
    while let Some(next) = ready.first().copied() {
        ready.remove(0);
        order.push(next);
        for &child in &children[next] {
            indegree[child] -= 1;
            if indegree[child] == 0 {
                ready.push(child);
                ready.sort_unstable();
            }
        }
    }

    if order.len() != requests.len() {
        let stuck: Vec<String> = requests
            .iter()
            .enumerate()
            .filter(|(i, _)| !order.contains(i))
            .map(|(_, r)| r.key.clone())
            .collect();
        return Err(SchedError::DependencyCycle(stuck));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str, parents: &[&str]) -> JobRequest {
        let mut r = JobRequest::new(key, Command::new(key, format!("/opt/tools/{key}.sh")));
        for p in parents {
            r = r.after(*p);
        }
        r
    }

    #[test]
    fn test_diamond_graph_orders_parents_first() {
        let requests = vec![
            request("merge", &["left", "right"]),
            request("left", &["start"]),
            request("right", &["start"]),
            request("start", &[]),
        ];
        let order = plan_submission_order(&requests).unwrap();
        let pos = |key: &str| {
            order
                .iter()
                .position(|&i| requests[i].key == key)
                .unwrap()
        };
        assert!(pos("start") < pos("left"));
        assert!(pos("start") < pos("right"));
        assert!(pos("left") < pos("merge"));
        assert!(pos("right") < pos("merge"));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let requests = vec![request("a", &["b"]), request("b", &["a"])];
        match plan_submission_order(&requests) {
            Err(SchedError::DependencyCycle(keys)) => {
                assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let requests = vec![request("a", &["ghost"])];
        assert!(matches!(
            plan_submission_order(&requests),
            Err(SchedError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_independent_requests_keep_input_order() {
        let requests = vec![request("a", &[]), request("b", &[]), request("c", &[])];
        assert_eq!(plan_submission_order(&requests).unwrap(), vec![0, 1, 2]);
    }
}
