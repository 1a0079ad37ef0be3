//! Builds and solves the integer program selecting which pods to restart for a single batch.

use std::collections::{BTreeSet, HashMap};

use good_lp::{
    constraint, solvers::coin_cbc::coin_cbc, variable, ProblemVariables, ResolutionError, Solution as LpSolution,
    SolverModel, Variable,
};
use log::debug;

use crate::connection::ConnectionState;
use crate::error::SolverError;
use crate::pod::Pod;

/// Weight of the edge-coverage term. Dominates the penalty terms so coverage is always the
/// primary objective.
pub const C1: f64 = 1000.0;
/// Weight of the major-restart penalty term.
pub const C3: f64 = 10.0;
/// Weight of the general restart-count penalty term.
pub const C4: f64 = 1.0;

const ROUNDING_TOLERANCE: f64 = 0.1;

fn round_binary(value: f64) -> Result<bool, SolverError> {
    if (value - 1.0).abs() <= ROUNDING_TOLERANCE {
        Ok(true)
    } else if value.abs() <= ROUNDING_TOLERANCE {
        Ok(false)
    } else {
        Err(SolverError::FractionalAssignment(value))
    }
}

/// Solve the single-batch selection problem for `state`, returning the selected pods.
///
/// Builds one binary variable per pod, one redundancy constraint per bounded type, and an
/// edge-coverage objective linearized with an auxiliary variable per unordered pod pair that
/// shares a weak edge (`y_e <= x_i + x_j`, maximizing `C1 * sum(y_e)`), penalized by major and
/// total restart counts.
pub fn solve_selection(state: &ConnectionState) -> Result<Vec<Pod>, SolverError> {
    let ids: Vec<String> = state.pods.iter().map(|(id, _)| id.to_string()).collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let index_of: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();

    let mut vars = ProblemVariables::new();
    let x: Vec<Variable> = (0..ids.len()).map(|_| vars.add(variable().binary())).collect();

    let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();
    for (s, t) in state.edges() {
        let i = index_of[s.as_str()];
        let j = index_of[t.as_str()];
        if i != j {
            pairs.insert(if i < j { (i, j) } else { (j, i) });
        }
    }
    let y: Vec<Variable> = pairs.iter().map(|_| vars.add(variable().min(0).max(1))).collect();

    let major_types = state.pods.major_types();
    let mut objective = good_lp::Expression::from(0);
    for &v in &y {
        objective += C1 * v;
    }
    for (i, id) in ids.iter().enumerate() {
        let pod = state.pods.get(id).expect("id listed from this container");
        if major_types.contains(&pod.name) {
            objective -= C3 * x[i];
        }
        objective -= C4 * x[i];
    }

    let mut problem = coin_cbc(vars.maximise(objective));

    #[cfg(any(test, feature = "hide-cbc-output"))]
    {
        problem.set_parameter("logLevel", "0");
    }
    #[cfg(feature = "cbc-parallel")]
    {
        problem.set_parameter("threads", &format!("{}", num_cpus::get()));
    }

    for (type_name, config) in state.pods.configs.iter() {
        let Some(redundancy) = config.redundancy else {
            continue;
        };
        let members: Vec<usize> = ids
            .iter()
            .enumerate()
            .filter(|(_, id)| {
                state
                    .pods
                    .get(id)
                    .map(|p| &p.name == type_name)
                    .unwrap_or(false)
            })
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            continue;
        }
        let sum = members
            .iter()
            .fold(good_lp::Expression::from(0), |acc, &i| acc + x[i]);
        problem.add_constraint(constraint!(sum <= redundancy as f64));
    }

    for (e, &(i, j)) in pairs.iter().enumerate() {
        problem.add_constraint(constraint!(y[e] <= x[i] + x[j]));
    }

    debug!(
        "solving selection model with {} pods, {} coverage variables",
        ids.len(),
        pairs.len()
    );

    let solution = problem.solve().map_err(|e| match e {
        ResolutionError::Infeasible => SolverError::Infeasible,
        other => SolverError::Backend(other.to_string()),
    })?;

    let mut selected = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        if round_binary(solution.value(x[i]))? {
            selected.push(state.pods.get(id).expect("id listed from this container").clone());
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::{Pod, PodConfig, PodContainer};

    fn tiny_covering_state() -> ConnectionState {
        let mut pods = PodContainer::new();
        pods.add_pods([Pod::new("a", 0), Pod::new("a", 1), Pod::new("b", 0)])
            .unwrap();
        pods.configs.insert("a".into(), PodConfig::new(Some(1), false));
        pods.configs.insert("b".into(), PodConfig::new(Some(1), true));

        let mut state = ConnectionState::new(pods);
        state.add_weak("a-0", "b-0").unwrap();
        state.add_weak("a-1", "b-0").unwrap();
        state
    }

    #[test]
    fn selects_the_shared_major_pod_to_cover_both_edges() {
        let state = tiny_covering_state();
        let selected = solve_selection(&state).unwrap();
        let ids: Vec<String> = selected.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["b-0".to_string()]);
    }

    #[test]
    fn redundancy_limits_selection_per_type() {
        let mut pods = PodContainer::new();
        pods.add_pods([Pod::new("a", 0), Pod::new("a", 1), Pod::new("a", 2)])
            .unwrap();
        pods.configs.insert("a".into(), PodConfig::new(Some(1), false));
        let mut state = ConnectionState::new(pods);
        state.add_weak("a-0", "a-1").unwrap();
        state.add_weak("a-1", "a-2").unwrap();

        let selected = solve_selection(&state).unwrap();
        assert!(selected.len() <= 1);
    }

    #[test]
    fn empty_state_selects_nothing() {
        let pods = PodContainer::new();
        let state = ConnectionState::new(pods);
        assert!(solve_selection(&state).unwrap().is_empty());
    }
}
