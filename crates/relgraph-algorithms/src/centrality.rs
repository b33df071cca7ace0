//! Centrality measures
//!
//! Normalizations follow the conventions analysts usually compare against:
//! degree is divided by `n - 1`, closeness uses the Wasserman-Faust scaling
//! for graphs that are not strongly connected, and betweenness is scaled by
//! `1 / ((n - 1)(n - 2))`.

use super::common::{GraphView, NodeId};
use rayon::prelude::*;
use std::collections::{HashMap, VecDeque};

/// Degree centrality: (in + out) degree over `n - 1`.
///
/// Undirected views already store each edge twice, so only the out-degree
/// is counted there.
pub fn degree_centrality(view: &GraphView) -> HashMap<NodeId, f64> {
    let n = view.node_count;
    if n <= 1 {
        return view.label_scores(vec![1.0; n]);
    }
    let scale = 1.0 / (n - 1) as f64;
    let scores = (0..n)
        .map(|i| {
            let degree = if view.directed {
                view.out_degree(i) + view.in_degree(i)
            } else {
                view.out_degree(i)
            };
            degree as f64 * scale
        })
        .collect();
    view.label_scores(scores)
}

/// Closeness centrality using inward distances.
///
/// For node `u`, distances are measured from every node that can reach `u`.
/// With `r` reachable nodes (including `u`) and total distance `d`, the score
/// is `((r - 1) / d) * ((r - 1) / (n - 1))`, and 0 when nothing reaches `u`.
pub fn closeness_centrality(view: &GraphView) -> HashMap<NodeId, f64> {
    let n = view.node_count;
    let scores = (0..n)
        .into_par_iter()
        .map(|u| {
            let distances = bfs_distances(n, u, |idx| view.predecessors(idx));
            let (reached, total) = distances
                .iter()
                .flatten()
                .fold((0usize, 0usize), |(r, t), &d| (r + 1, t + d));
            if total == 0 || n <= 1 {
                return 0.0;
            }
            let others = (reached - 1) as f64;
            (others / total as f64) * (others / (n - 1) as f64)
        })
        .collect();
    view.label_scores(scores)
}

/// Normalized betweenness centrality (Brandes).
///
/// Each source's dependency accumulation runs independently, so sources are
/// processed in parallel and summed.
pub fn betweenness_centrality(view: &GraphView) -> HashMap<NodeId, f64> {
    let n = view.node_count;
    let raw = (0..n)
        .into_par_iter()
        .map(|s| single_source_dependencies(view, s))
        .reduce(
            || vec![0.0; n],
            |mut acc, part| {
                for (a, p) in acc.iter_mut().zip(part) {
                    *a += p;
                }
                acc
            },
        );

    let scale = if n > 2 {
        1.0 / ((n - 1) * (n - 2)) as f64
    } else {
        1.0
    };
    view.label_scores(raw.into_iter().map(|b| b * scale).collect())
}

fn single_source_dependencies(view: &GraphView, s: usize) -> Vec<f64> {
    let n = view.node_count;
    let mut stack = Vec::with_capacity(n);
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0f64; n];
    let mut dist: Vec<Option<usize>> = vec![None; n];
    let mut queue = VecDeque::new();

    sigma[s] = 1.0;
    dist[s] = Some(0);
    queue.push_back(s);

    while let Some(v) = queue.pop_front() {
        stack.push(v);
        let dv = dist[v].unwrap_or_default();
        for &w in view.successors(v) {
            if dist[w].is_none() {
                dist[w] = Some(dv + 1);
                queue.push_back(w);
            }
            if dist[w] == Some(dv + 1) {
                sigma[w] += sigma[v];
                preds[w].push(v);
            }
        }
    }

    let mut delta = vec![0.0f64; n];
    let mut dependencies = vec![0.0f64; n];
    while let Some(w) = stack.pop() {
        for &v in &preds[w] {
            delta[v] += (sigma[v] / sigma[w]) * (1.0 + delta[w]);
        }
        if w != s {
            dependencies[w] += delta[w];
        }
    }
    dependencies
}

fn bfs_distances<'a, F>(n: usize, start: usize, neighbours: F) -> Vec<Option<usize>>
where
    F: Fn(usize) -> &'a [usize],
{
    let mut dist = vec![None; n];
    let mut queue = VecDeque::new();
    dist[start] = Some(0);
    queue.push_back(start);
    while let Some(v) = queue.pop_front() {
        let dv = dist[v].unwrap_or_default();
        for &w in neighbours(v) {
            if dist[w].is_none() {
                dist[w] = Some(dv + 1);
                queue.push_back(w);
            }
        }
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path3(directed: bool) -> GraphView {
        // a - b - c
        GraphView::from_edges(vec![1, 2, 3], &[(0, 1), (1, 2)], directed)
    }

    #[test]
    fn test_betweenness_path_center() {
        let scores = betweenness_centrality(&path3(false));
        assert!((scores[&2] - 1.0).abs() < 1e-9);
        assert_eq!(scores[&1], 0.0);
        assert_eq!(scores[&3], 0.0);
    }

    #[test]
    fn test_betweenness_star() {
        // center 0 with three leaves
        let view = GraphView::from_edges(vec![0, 1, 2, 3], &[(0, 1), (0, 2), (0, 3)], false);
        let scores = betweenness_centrality(&view);
        assert!((scores[&0] - 1.0).abs() < 1e-9);
        assert_eq!(scores[&1], 0.0);
    }

    #[test]
    fn test_betweenness_directed_path() {
        let scores = betweenness_centrality(&path3(true));
        assert!((scores[&2] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_closeness_path() {
        let scores = closeness_centrality(&path3(false));
        assert!((scores[&2] - 1.0).abs() < 1e-9);
        assert!((scores[&1] - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_closeness_unreachable_is_zero() {
        // 1 -> 2: nothing reaches node 1
        let view = GraphView::from_edges(vec![1, 2], &[(0, 1)], true);
        let scores = closeness_centrality(&view);
        assert_eq!(scores[&1], 0.0);
        assert!((scores[&2] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_degree() {
        let scores = degree_centrality(&path3(false));
        assert!((scores[&2] - 1.0).abs() < 1e-9);
        assert!((scores[&1] - 0.5).abs() < 1e-9);

        let directed = degree_centrality(&path3(true));
        assert!((directed[&2] - 1.0).abs() < 1e-9);
    }
}
