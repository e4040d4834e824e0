//! Region merging: cluster primitive boxes into diagram regions.
//!
//! The proximity test is [`BoundingBox::edges_within`]: two boxes are near
//! when any one pair of corresponding edges differs by less than the merge
//! distance. In [`MergeMode::OneHop`] a group is the seed plus every unused
//! box near the seed, so a chain `a ~ b ~ c` with `c` not near `a` yields two
//! regions. [`MergeMode::Transitive`] follows the chain through any member.
//!
//! Both modes are greedy over the input order and the output order is the
//! seed order, so the same boxes in the same order always give the same
//! regions and ranks.

use crate::config::MergeMode;
use crate::geometry::{BoundingBox, DiagramRegion};
use std::collections::VecDeque;
use tracing::debug;

/// Merge `boxes` into regions. Ranks are 1-based in seed order.
pub fn merge_regions(boxes: &[BoundingBox], distance: f64, mode: MergeMode) -> Vec<DiagramRegion> {
    if boxes.is_empty() {
        debug!("No boxes to merge");
        return Vec::new();
    }

    let mut used = vec![false; boxes.len()];
    let mut regions = Vec::new();

    for seed in 0..boxes.len() {
        if used[seed] {
            continue;
        }
        used[seed] = true;

        let members = match mode {
            MergeMode::OneHop => gather_one_hop(boxes, seed, distance, &mut used),
            MergeMode::Transitive => gather_transitive(boxes, seed, distance, &mut used),
        };

        let bbox = members
            .iter()
            .skip(1)
            .fold(boxes[seed], |acc, &i| acc.union(&boxes[i]));

        regions.push(DiagramRegion {
            rank: regions.len() + 1,
            bbox,
            members,
        });
    }

    debug!(
        "Merged {} boxes into {} regions ({:?}, distance {})",
        boxes.len(),
        regions.len(),
        mode,
        distance
    );
    regions
}

fn gather_one_hop(boxes: &[BoundingBox], seed: usize, distance: f64, used: &mut [bool]) -> Vec<usize> {
    let mut members = vec![seed];
    for (j, candidate) in boxes.iter().enumerate() {
        if !used[j] && boxes[seed].edges_within(candidate, distance) {
            used[j] = true;
            members.push(j);
        }
    }
    members
}

fn gather_transitive(boxes: &[BoundingBox], seed: usize, distance: f64, used: &mut [bool]) -> Vec<usize> {
    let mut members = vec![seed];
    let mut queue = VecDeque::from([seed]);
    while let Some(current) = queue.pop_front() {
        for (j, candidate) in boxes.iter().enumerate() {
            if !used[j] && boxes[current].edges_within(candidate, distance) {
                used[j] = true;
                members.push(j);
                queue.push_back(j);
            }
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(x0: f64, y0: f64, x1: f64, y1: f64) -> BoundingBox {
        BoundingBox::new(x0, y0, x1, y1)
    }

    fn chain() -> Vec<BoundingBox> {
        vec![
            b(0.0, 0.0, 10.0, 10.0),
            // Near box 0 on x0 only.
            b(25.0, 500.0, 600.0, 700.0),
            // Near box 1 on x1 only, near nothing else.
            b(500.0, 1000.0, 610.0, 1100.0),
        ]
    }

    #[test]
    fn identical_boxes_merge() {
        let boxes = vec![b(0.0, 0.0, 10.0, 10.0), b(0.0, 0.0, 10.0, 10.0)];
        let regions = merge_regions(&boxes, 30.0, MergeMode::OneHop);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bbox, b(0.0, 0.0, 10.0, 10.0));
        assert_eq!(regions[0].members, vec![0, 1]);
    }

    #[test]
    fn distant_misaligned_boxes_stay_separate() {
        let boxes = vec![b(0.0, 0.0, 10.0, 10.0), b(1000.0, 1000.0, 1010.0, 1010.0)];
        let regions = merge_regions(&boxes, 30.0, MergeMode::OneHop);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].rank, 1);
        assert_eq!(regions[1].rank, 2);
        assert_eq!(regions[1].bbox, boxes[1]);
    }

    #[test]
    fn one_hop_does_not_follow_chains() {
        let boxes = chain();
        let regions = merge_regions(&boxes, 30.0, MergeMode::OneHop);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].members, vec![0, 1]);
        assert_eq!(regions[0].bbox, b(0.0, 0.0, 600.0, 700.0));
        assert_eq!(regions[1].members, vec![2]);
    }

    #[test]
    fn transitive_follows_chains() {
        let regions = merge_regions(&chain(), 30.0, MergeMode::Transitive);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].members, vec![0, 1, 2]);
        assert_eq!(regions[0].bbox, b(0.0, 0.0, 610.0, 1100.0));
    }

    #[test]
    fn result_depends_on_input_order() {
        let mut boxes = chain();
        boxes.rotate_left(1); // seed is now the middle box
        let regions = merge_regions(&boxes, 30.0, MergeMode::OneHop);
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn far_but_aligned_boxes_merge() {
        let boxes = vec![b(0.0, 0.0, 100.0, 100.0), b(5.0, 5000.0, 900.0, 6000.0)];
        assert_eq!(merge_regions(&boxes, 30.0, MergeMode::OneHop).len(), 1);
    }

    #[test]
    fn touching_but_misaligned_boxes_do_not_merge() {
        let boxes = vec![b(0.0, 0.0, 100.0, 100.0), b(100.0, 40.0, 200.0, 140.0)];
        assert_eq!(merge_regions(&boxes, 30.0, MergeMode::OneHop).len(), 2);
    }

    #[test]
    fn empty_input_gives_no_regions() {
        assert!(merge_regions(&[], 30.0, MergeMode::OneHop).is_empty());
        assert!(merge_regions(&[], 30.0, MergeMode::Transitive).is_empty());
    }

    #[test]
    fn every_box_lands_in_exactly_one_region_that_contains_it() {
        let boxes: Vec<BoundingBox> = (0..40)
            .map(|i| {
                let x = ((i * 37) % 500) as f64;
                let y = ((i * 53) % 700) as f64;
                b(x, y, x + 20.0 + i as f64, y + 15.0)
            })
            .collect();
        for mode in [MergeMode::OneHop, MergeMode::Transitive] {
            let regions = merge_regions(&boxes, 30.0, mode);
            let mut seen = vec![0usize; boxes.len()];
            for region in &regions {
                for &m in &region.members {
                    seen[m] += 1;
                    assert!(region.bbox.contains(&boxes[m]), "{mode:?}: region misses box {m}");
                }
            }
            assert!(seen.iter().all(|&c| c == 1), "{mode:?}: {seen:?}");
        }
    }

    #[test]
    fn zero_distance_never_merges() {
        let boxes = vec![b(0.0, 0.0, 10.0, 10.0), b(0.0, 0.0, 10.0, 10.0)];
        assert_eq!(merge_regions(&boxes, 0.0, MergeMode::OneHop).len(), 2);
    }
}
