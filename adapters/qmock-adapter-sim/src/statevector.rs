//! Statevector simulation.

use num_complex::Complex64;
use rand::Rng;
use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, FRAC_PI_4, PI};

use qmock_qir::Gate;

/// 2x2 unitary acting on one target qubit, row-major.
type Matrix2 = [[Complex64; 2]; 2];

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

fn phase_matrix(theta: f64) -> Matrix2 {
    [[ONE, ZERO], [ZERO, Complex64::from_polar(1.0, theta)]]
}

/// Matrix of a single-target gate; `None` for SWAP.
///
/// Controlled gates map to the matrix applied to their target.
fn target_matrix(gate: &Gate) -> Option<Matrix2> {
    let m = match *gate {
        Gate::X | Gate::CX | Gate::CCX => [[ZERO, ONE], [ONE, ZERO]],
        Gate::Y | Gate::CY => [[ZERO, -I], [I, ZERO]],
        Gate::Z | Gate::CZ => phase_matrix(PI),
        Gate::H => {
            let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
            [[h, h], [h, -h]]
        }
        Gate::S => phase_matrix(FRAC_PI_2),
        Gate::Sdg => phase_matrix(-FRAC_PI_2),
        Gate::T => phase_matrix(FRAC_PI_4),
        Gate::Tdg => phase_matrix(-FRAC_PI_4),
        Gate::P(theta) => phase_matrix(theta),
        Gate::Rx(theta) => {
            let (s, c) = (theta / 2.0).sin_cos();
            let c = Complex64::new(c, 0.0);
            let mis = Complex64::new(0.0, -s);
            [[c, mis], [mis, c]]
        }
        Gate::Ry(theta) => {
            let (s, c) = (theta / 2.0).sin_cos();
            [
                [Complex64::new(c, 0.0), Complex64::new(-s, 0.0)],
                [Complex64::new(s, 0.0), Complex64::new(c, 0.0)],
            ]
        }
        Gate::Rz(theta) => [
            [Complex64::from_polar(1.0, -theta / 2.0), ZERO],
            [ZERO, Complex64::from_polar(1.0, theta / 2.0)],
        ],
        Gate::U(theta, phi, lambda) => {
            let (s, c) = (theta / 2.0).sin_cos();
            [
                [
                    Complex64::new(c, 0.0),
                    -Complex64::from_polar(s, lambda),
                ],
                [
                    Complex64::from_polar(s, phi),
                    Complex64::from_polar(c, phi + lambda),
                ],
            ]
        }
        Gate::Swap => return None,
    };
    Some(m)
}

/// Dense state of an n-qubit register. Qubit `q` is bit `q` of the index.
pub struct Statevector {
    amplitudes: Vec<Complex64>,
    num_qubits: usize,
}

impl Statevector {
    /// Register of `num_qubits` qubits in |0...0⟩.
    pub fn new(num_qubits: usize) -> Self {
        let mut amplitudes = vec![ZERO; 1 << num_qubits];
        amplitudes[0] = ONE;
        Self {
            amplitudes,
            num_qubits,
        }
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Apply `gate` with operands in QIR order (controls first, target last).
    ///
    /// Operand count and distinctness are checked by the caller.
    pub fn apply_gate(&mut self, gate: &Gate, qubits: &[usize]) {
        let Some((&target, controls)) = qubits.split_last() else {
            return;
        };
        match target_matrix(gate) {
            Some(m) => {
                let control_mask = controls.iter().fold(0usize, |mask, &q| mask | (1 << q));
                self.apply_controlled(control_mask, target, &m);
            }
            None => self.apply_swap(qubits[0], target),
        }
    }

    /// Apply `m` to `target` on the subspace where every bit of `control_mask` is set.
    fn apply_controlled(&mut self, control_mask: usize, target: usize, m: &Matrix2) {
        let target_mask = 1 << target;
        for i in 0..self.amplitudes.len() {
            if i & target_mask != 0 || i & control_mask != control_mask {
                continue;
            }
            let j = i | target_mask;
            let (a, b) = (self.amplitudes[i], self.amplitudes[j]);
            self.amplitudes[i] = m[0][0] * a + m[0][1] * b;
            self.amplitudes[j] = m[1][0] * a + m[1][1] * b;
        }
    }

    fn apply_swap(&mut self, q1: usize, q2: usize) {
        let (m1, m2) = (1 << q1, 1 << q2);
        for i in 0..self.amplitudes.len() {
            if i & m1 != 0 && i & m2 == 0 {
                self.amplitudes.swap(i, (i & !m1) | m2);
            }
        }
    }

    // =========================================================================
    // Non-unitary operations
    // =========================================================================

    /// Measure `qubit` in the Z basis, collapsing and renormalizing the state.
    pub fn measure(&mut self, qubit: usize, rng: &mut impl Rng) -> bool {
        let mask = 1 << qubit;
        let p_one: f64 = self
            .amplitudes
            .iter()
            .enumerate()
            .filter_map(|(i, amp)| (i & mask != 0).then(|| amp.norm_sqr()))
            .sum();
        let outcome = rng.r#gen::<f64>() < p_one;

        let kept = if outcome { p_one } else { 1.0 - p_one };
        let scale = if kept > 0.0 { kept.sqrt().recip() } else { 0.0 };
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            *amp = if (i & mask != 0) == outcome {
                *amp * scale
            } else {
                ZERO
            };
        }
        outcome
    }

    /// Reset `qubit` to |0⟩ by measuring and flipping on a one.
    pub fn reset(&mut self, qubit: usize, rng: &mut impl Rng) {
        if self.measure(qubit, rng) {
            self.apply_gate(&Gate::X, &[qubit]);
        }
    }

    /// Sample a full-register outcome without collapsing the state.
    pub fn sample(&self, rng: &mut impl Rng) -> usize {
        let remaining: f64 = rng.r#gen();
        self.sample_at(remaining)
    }

    /// Outcome at cumulative probability `remaining` in `[0, 1)`.
    fn sample_at(&self, mut remaining: f64) -> usize {
        self.amplitudes
            .iter()
            .position(|amp| {
                remaining -= amp.norm_sqr();
                remaining < 0.0
            })
            // Rounding left the total just below `remaining`: take the last
            // outcome that can actually occur.
            .or_else(|| self.amplitudes.iter().rposition(|amp| amp.norm_sqr() > 0.0))
            .unwrap_or(0)
    }

    /// Convert an outcome to a bitstring, qubit 0 first.
    pub fn outcome_to_bitstring(&self, outcome: usize) -> String {
        (0..self.num_qubits)
            .map(|q| if outcome & (1 << q) != 0 { '1' } else { '0' })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn approx_eq(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-10
    }

    #[test]
    fn test_initial_state() {
        let sv = Statevector::new(2);
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(1.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[2], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(0.0, 0.0)));
    }

    #[test]
    fn test_bell_state() {
        let mut sv = Statevector::new(2);
        sv.apply_gate(&Gate::H, &[0]);
        sv.apply_gate(&Gate::CX, &[0, 1]);

        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(sqrt2_inv, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[2], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(sqrt2_inv, 0.0)));
    }

    #[test]
    fn test_adjoint_pairs_cancel() {
        let mut sv = Statevector::new(1);
        sv.apply_gate(&Gate::H, &[0]);
        sv.apply_gate(&Gate::T, &[0]);
        sv.apply_gate(&Gate::Tdg, &[0]);
        sv.apply_gate(&Gate::U(0.3, 0.7, 1.1), &[0]);
        sv.apply_gate(&Gate::U(0.3, 0.7, 1.1).adjoint(), &[0]);
        sv.apply_gate(&Gate::H, &[0]);

        assert!(approx_eq(sv.amplitudes[0], Complex64::new(1.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, 0.0)));
    }

    #[test]
    fn test_controlled_y_and_z() {
        let mut sv = Statevector::new(2);
        sv.apply_gate(&Gate::X, &[0]);
        sv.apply_gate(&Gate::CY, &[0, 1]);
        assert!(approx_eq(sv.amplitudes[0b11], I));

        sv.apply_gate(&Gate::CZ, &[0, 1]);
        assert!(approx_eq(sv.amplitudes[0b11], -I));
    }

    #[test]
    fn test_swap() {
        let mut sv = Statevector::new(2);
        sv.apply_gate(&Gate::X, &[0]);
        sv.apply_gate(&Gate::Swap, &[0, 1]);
        assert!(approx_eq(sv.amplitudes[0b10], ONE));
    }

    #[test]
    fn test_rotations_match_named_gates() {
        // Rx(pi) is X up to a global phase of -i.
        let mut sv = Statevector::new(1);
        sv.apply_gate(&Gate::Rx(PI), &[0]);
        assert!(approx_eq(sv.amplitudes[1], -I));

        let mut sv = Statevector::new(1);
        sv.apply_gate(&Gate::Ry(PI), &[0]);
        assert!(approx_eq(sv.amplitudes[1], ONE));
    }

    #[test]
    fn test_toffoli() {
        let mut sv = Statevector::new(3);
        sv.apply_gate(&Gate::X, &[0]);
        sv.apply_gate(&Gate::X, &[1]);
        sv.apply_gate(&Gate::CCX, &[0, 1, 2]);
        assert!(approx_eq(sv.amplitudes[0b111], Complex64::new(1.0, 0.0)));
    }

    #[test]
    fn test_measure_collapses() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut sv = Statevector::new(2);
            sv.apply_gate(&Gate::H, &[0]);
            sv.apply_gate(&Gate::CX, &[0, 1]);
            let first = sv.measure(0, &mut rng);
            // Partner qubit is now deterministic.
            assert_eq!(sv.measure(1, &mut rng), first);
        }
    }

    #[test]
    fn test_reset_returns_to_zero() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let mut sv = Statevector::new(1);
            sv.apply_gate(&Gate::H, &[0]);
            sv.reset(0, &mut rng);
            assert!((sv.amplitudes[0].norm_sqr() - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_sample_rounding_never_yields_impossible_outcome() {
        // |10⟩ with a norm just under one; index 0b11 has zero amplitude.
        let mut sv = Statevector::new(2);
        sv.amplitudes[0] = ZERO;
        sv.amplitudes[1] = Complex64::new((1.0 - 1e-12_f64).sqrt(), 0.0);

        assert_eq!(sv.sample_at(1.0 - 1e-15), 1);
        assert_eq!(sv.sample_at(0.5), 1);
    }

    #[test]
    fn test_sample_deterministic() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut sv = Statevector::new(2);
        sv.apply_gate(&Gate::X, &[0]);

        for _ in 0..100 {
            let outcome = sv.sample(&mut rng);
            assert_eq!(outcome, 1);
            assert_eq!(sv.outcome_to_bitstring(outcome), "10");
        }
    }
}
