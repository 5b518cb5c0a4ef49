#[cfg(test)]
use crate::mdps::mdp::Mdp;
#[cfg(test)]
use std::collections::HashMap;

/// https://towardsdatascience.com/reinforcement-learning-an-easy-introduction-to-value-iteration-e4cfe0731fd5
///
/// States: 0 = fairway, 1 = green, 2 = in the hole. Actions: 0 = hit to
/// green, 1 = hit to fairway, 2 = putt.
#[cfg(test)]
pub struct SimpleGolf {
    actions: Vec<Vec<usize>>,
    transitions: HashMap<(usize, usize), Vec<(usize, f64)>>,
}

#[cfg(test)]
impl SimpleGolf {
    pub fn new() -> Self {
        let transitions = HashMap::from([
            ((0, 0), vec![(1, 0.9), (0, 0.1)]),
            ((1, 1), vec![(0, 0.9), (1, 0.1)]),
            ((1, 2), vec![(2, 0.9), (1, 0.1)]),
        ]);

        Self {
            actions: vec![vec![0], vec![1, 2], vec![]],
            transitions,
        }
    }
}

#[cfg(test)]
impl Mdp for SimpleGolf {
    type State = usize;

    type Action = usize;

    fn states(&self) -> Vec<usize> {
        (0..self.actions.len()).collect()
    }

    fn actions(&self, s: usize) -> &[usize] {
        self.actions.get(s).map(Vec::as_slice).unwrap_or(&[])
    }

    fn reward(&self, s: usize) -> f64 {
        if s == 2 {
            10.
        } else {
            0.
        }
    }

    fn successors(&self, s: usize, a: usize) -> Vec<(usize, f64)> {
        self.transitions.get(&(s, a)).cloned().unwrap_or_default()
    }
}
