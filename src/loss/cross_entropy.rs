/// Categorical cross-entropy over softmax outputs.
pub struct CrossEntropyLoss;

/// Keeps `ln` finite when a probability underflows to zero.
const EPS: f64 = 1e-12;

impl CrossEntropyLoss {
    /// `-Σ expected[i] · ln(predicted[i])` for a target distribution.
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        predicted
            .iter()
            .zip(expected)
            .map(|(p, e)| -e * (p + EPS).ln())
            .sum()
    }

    /// Loss against a one-hot target given by its class index.
    pub fn loss_for_class(predicted: &[f64], class: usize) -> f64 {
        predicted.get(class).map_or(f64::INFINITY, |p| -(p + EPS).ln())
    }

    /// ∂L/∂logits for softmax followed by cross-entropy: `predicted - expected`.
    ///
    /// The softmax layer reports a unit derivative, so this delta enters the
    /// backward pass as-is.
    pub fn derivative(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        predicted.iter().zip(expected).map(|(p, e)| p - e).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confident_correct_prediction_has_low_loss() {
        let expected = [0.0, 1.0, 0.0];
        let good = CrossEntropyLoss::loss(&[0.01, 0.98, 0.01], &expected);
        let bad = CrossEntropyLoss::loss(&[0.98, 0.01, 0.01], &expected);
        assert!(good < 0.05);
        assert!(bad > 4.0);
    }

    #[test]
    fn class_index_matches_one_hot() {
        let predicted = [0.1, 0.6, 0.3];
        let dense = CrossEntropyLoss::loss(&predicted, &[0.0, 0.0, 1.0]);
        assert!((CrossEntropyLoss::loss_for_class(&predicted, 2) - dense).abs() < 1e-12);
        assert!(CrossEntropyLoss::loss_for_class(&predicted, 3).is_infinite());
    }

    #[test]
    fn derivative_is_predicted_minus_expected() {
        let grad = CrossEntropyLoss::derivative(&[0.2, 0.7, 0.1], &[0.0, 1.0, 0.0]);
        let expected = [0.2, -0.3, 0.1];
        for (g, e) in grad.iter().zip(expected) {
            assert!((g - e).abs() < 1e-12);
        }
    }
}
