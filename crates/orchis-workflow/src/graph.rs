use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::Job;

/// Dependency graph of a workflow's jobs.
///
/// Edges point from a dependency to its dependents.
#[derive(Debug, Clone)]
pub struct Graph {
  /// job -> jobs that depend on it.
  downstream: BTreeMap<String, Vec<String>>,
  /// job -> jobs it depends on, in declaration order.
  upstream: BTreeMap<String, Vec<String>>,
}

impl Graph {
  /// Build a graph from a job map.
  ///
  /// Dependencies naming jobs outside the map are kept as upstream entries but
  /// get no node of their own; validation rejects them before a graph is used.
  pub fn new(jobs: &BTreeMap<String, Job>) -> Self {
    let mut downstream: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut upstream: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for name in jobs.keys() {
      downstream.entry(name.clone()).or_default();
      upstream.entry(name.clone()).or_default();
    }

    for (name, job) in jobs {
      for dependency in &job.depends_on {
        upstream.entry(name.clone()).or_default().push(dependency.clone());
        if let Some(dependents) = downstream.get_mut(dependency) {
          dependents.push(name.clone());
        }
      }
    }

    Self {
      downstream,
      upstream,
    }
  }

  /// Jobs that depend on `job`.
  pub fn downstream(&self, job: &str) -> &[String] {
    self
      .downstream
      .get(job)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Jobs `job` depends on.
  pub fn upstream(&self, job: &str) -> &[String] {
    self
      .upstream
      .get(job)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// All direct and transitive dependencies of `job`.
  pub fn ancestors(&self, job: &str) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut pending: Vec<&str> = self.upstream(job).iter().map(String::as_str).collect();
    while let Some(next) = pending.pop() {
      if seen.insert(next.to_string()) {
        pending.extend(self.upstream(next).iter().map(String::as_str));
      }
    }
    seen
  }

  /// Find a dependency cycle, returned as the path that closes it
  /// (`["a", "b", "a"]`).
  pub fn detect_cycle(&self) -> Option<Vec<String>> {
    // 0 = unvisited, 1 = on the current path, 2 = done
    let mut color: BTreeMap<&str, u8> = self.downstream.keys().map(|k| (k.as_str(), 0u8)).collect();
    let mut path: Vec<&str> = Vec::new();

    fn dfs<'a>(
      node: &'a str,
      downstream: &'a BTreeMap<String, Vec<String>>,
      color: &mut BTreeMap<&'a str, u8>,
      path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
      color.insert(node, 1);
      path.push(node);

      if let Some(neighbors) = downstream.get(node) {
        for neighbor in neighbors {
          match color.get(neighbor.as_str()) {
            Some(1) => {
              let start = path.iter().position(|n| *n == neighbor).unwrap_or(0);
              let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
              cycle.push(neighbor.clone());
              return Some(cycle);
            }
            Some(0) => {
              if let Some(cycle) = dfs(neighbor, downstream, color, path) {
                return Some(cycle);
              }
            }
            _ => {}
          }
        }
      }

      path.pop();
      color.insert(node, 2);
      None
    }

    for node in self.downstream.keys() {
      if color.get(node.as_str()) == Some(&0) {
        if let Some(cycle) = dfs(node, &self.downstream, &mut color, &mut path) {
          return Some(cycle);
        }
      }
    }

    None
  }

  /// Jobs ordered so that every job comes after all of its dependencies.
  ///
  /// Jobs that sit on a cycle are left out.
  pub fn topological_order(&self) -> Vec<String> {
    let mut remaining: BTreeMap<&str, usize> = self
      .upstream
      .iter()
      .map(|(name, deps)| {
        let known = deps.iter().filter(|d| self.downstream.contains_key(*d)).count();
        (name.as_str(), known)
      })
      .collect();

    let mut ready: VecDeque<&str> = remaining
      .iter()
      .filter(|(_, count)| **count == 0)
      .map(|(name, _)| *name)
      .collect();
    let mut order = Vec::with_capacity(remaining.len());

    while let Some(name) = ready.pop_front() {
      order.push(name.to_string());
      for dependent in self.downstream(name) {
        if let Some(count) = remaining.get_mut(dependent.as_str()) {
          *count -= 1;
          if *count == 0 {
            ready.push_back(dependent.as_str());
          }
        }
      }
    }

    order
  }
}
