//! Proximity grouping of person centroids.

use crate::shared::detection::Point;

/// Indices into the centroid slice passed to [`group_people`]. Never empty.
pub type Group = Vec<usize>;

/// Partitions `centroids` into groups of people standing close together.
///
/// Single pass in input order: each unvisited centroid seeds a group, then
/// every later unvisited centroid joins if it is strictly closer than
/// `threshold` to any member already in the group. Membership is never
/// revisited, so the result depends on input order; two centroids that only
/// become connected through a later member stay in separate groups.
pub fn group_people(centroids: &[Point], threshold: f64) -> Vec<Group> {
    let n = centroids.len();
    let mut visited = vec![false; n];
    let mut groups = Vec::new();

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let mut group = vec![i];

        for j in (i + 1)..n {
            if visited[j] {
                continue;
            }
            let near = group
                .iter()
                .any(|&k| centroids[k].distance(&centroids[j]) < threshold);
            if near {
                group.push(j);
                visited[j] = true;
            }
        }

        groups.push(group);
    }

    groups
}
