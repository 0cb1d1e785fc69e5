use rand::Rng;

/// Draws up to `count` items without replacement, each draw picking a remaining
/// item with probability proportional to `max(weight, 0)`.
///
/// Output order is draw order. Items without positive weight are never drawn,
/// so fewer than `count` items come back when the positive pool runs out.
pub fn weighted_sample_without_replacement<T, R>(
    items: &[(T, f64)],
    count: usize,
    rng: &mut R,
) -> Vec<T>
where
    T: Clone,
    R: Rng + ?Sized,
{
    let mut pool: Vec<(&T, f64)> = items
        .iter()
        .filter(|(_, weight)| *weight > 0.0)
        .map(|(item, weight)| (item, *weight))
        .collect();
    let mut drawn = Vec::with_capacity(count.min(pool.len()));

    while drawn.len() < count && !pool.is_empty() {
        // Summed per draw; a running difference leaves residue after removals.
        let total: f64 = pool.iter().map(|(_, weight)| weight).sum();
        if total <= 0.0 {
            break;
        }

        let target = rng.gen::<f64>() * total;
        let mut accumulated = 0.0;
        // Float drift can leave the scan short of the target.
        let mut picked = pool.len() - 1;
        for (index, (_, weight)) in pool.iter().enumerate() {
            accumulated += weight;
            if accumulated >= target {
                picked = index;
                break;
            }
        }

        let (item, _) = pool.remove(picked);
        drawn.push(item.clone());
    }

    drawn
}
