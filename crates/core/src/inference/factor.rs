//! Dense discrete factors over network variables.
//!
//! Values are stored row-major over `scope`: the last variable varies fastest.
//! A factor with an empty scope holds a single scalar.

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq)]
pub struct Factor {
    scope: Vec<usize>,
    cards: Vec<usize>,
    values: Vec<f64>,
}

impl Factor {
    pub fn new(scope: Vec<usize>, cards: Vec<usize>, values: Vec<f64>) -> Result<Self, DomainError> {
        if scope.len() != cards.len() {
            return Err(DomainError::InvariantViolation(format!(
                "factor scope has {} variables but {} cardinalities",
                scope.len(),
                cards.len()
            )));
        }
        let expected: usize = cards.iter().product();
        if values.len() != expected {
            return Err(DomainError::InvariantViolation(format!(
                "factor expects {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self { scope, cards, values })
    }

    pub fn scalar(value: f64) -> Self {
        Self { scope: Vec::new(), cards: Vec::new(), values: vec![value] }
    }

    pub fn scope(&self) -> &[usize] {
        &self.scope
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn contains(&self, variable: usize) -> bool {
        self.scope.contains(&variable)
    }

    pub fn cardinality(&self, variable: usize) -> Option<usize> {
        self.position(variable).map(|pos| self.cards[pos])
    }

    fn position(&self, variable: usize) -> Option<usize> {
        self.scope.iter().position(|candidate| *candidate == variable)
    }

    /// Fix `variable` to `state` and drop it from the scope.
    pub fn reduce(&self, variable: usize, state: usize) -> Factor {
        let Some(pos) = self.position(variable) else {
            return self.clone();
        };

        let (scope, cards) = self.without(pos);
        let mut values = Vec::with_capacity(self.values.len() / self.cards[pos].max(1));
        for_each_assignment(&self.cards, |flat, assignment| {
            if assignment[pos] == state {
                values.push(self.values[flat]);
            }
        });

        Factor { scope, cards, values }
    }

    /// Sum `variable` out of the factor.
    pub fn marginalize(&self, variable: usize) -> Factor {
        let Some(pos) = self.position(variable) else {
            return self.clone();
        };

        let (scope, cards) = self.without(pos);
        let out_strides = strides(&cards);
        let mut values = vec![0.0; cards.iter().product()];
        for_each_assignment(&self.cards, |flat, assignment| {
            let target: usize = assignment
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != pos)
                .map(|(_, state)| *state)
                .zip(&out_strides)
                .map(|(state, stride)| state * stride)
                .sum();
            values[target] += self.values[flat];
        });

        Factor { scope, cards, values }
    }

    /// Pointwise product over the union of both scopes.
    pub fn product(&self, other: &Factor) -> Factor {
        let mut scope = self.scope.clone();
        let mut cards = self.cards.clone();
        for (variable, card) in other.scope.iter().zip(&other.cards) {
            if !scope.contains(variable) {
                scope.push(*variable);
                cards.push(*card);
            }
        }

        let left = projection(&scope, &self.scope, &self.cards);
        let right = projection(&scope, &other.scope, &other.cards);

        let mut values = Vec::with_capacity(cards.iter().product());
        for_each_assignment(&cards, |_, assignment| {
            values.push(self.values[left.index(assignment)] * other.values[right.index(assignment)]);
        });

        Factor { scope, cards, values }
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    fn without(&self, pos: usize) -> (Vec<usize>, Vec<usize>) {
        let mut scope = self.scope.clone();
        let mut cards = self.cards.clone();
        scope.remove(pos);
        cards.remove(pos);
        (scope, cards)
    }
}

/// Maps an assignment over a wider scope to a flat index into a sub-factor.
struct Projection {
    terms: Vec<(usize, usize)>,
}

impl Projection {
    fn index(&self, assignment: &[usize]) -> usize {
        self.terms.iter().map(|(pos, stride)| assignment[*pos] * stride).sum()
    }
}

fn projection(wide: &[usize], narrow: &[usize], narrow_cards: &[usize]) -> Projection {
    let narrow_strides = strides(narrow_cards);
    let terms = narrow
        .iter()
        .zip(narrow_strides)
        .filter_map(|(variable, stride)| {
            wide.iter().position(|candidate| candidate == variable).map(|pos| (pos, stride))
        })
        .collect();
    Projection { terms }
}

fn strides(cards: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; cards.len()];
    for index in (0..cards.len().saturating_sub(1)).rev() {
        strides[index] = strides[index + 1] * cards[index + 1];
    }
    strides
}

/// Visit every assignment in row-major order together with its flat index.
fn for_each_assignment(cards: &[usize], mut visit: impl FnMut(usize, &[usize])) {
    let total: usize = cards.iter().product();
    let mut assignment = vec![0; cards.len()];
    for flat in 0..total {
        visit(flat, &assignment);
        for pos in (0..cards.len()).rev() {
            assignment[pos] += 1;
            if assignment[pos] < cards[pos] {
                break;
            }
            assignment[pos] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Factor;

    fn approx_eq(left: &[f64], right: &[f64]) -> bool {
        left.len() == right.len() && left.iter().zip(right).all(|(a, b)| (a - b).abs() < 1e-12)
    }

    #[test]
    fn reduce_keeps_matching_rows_in_order() {
        // scope (a, b), a in {0,1}, b in {0,1,2}
        let factor =
            Factor::new(vec![0, 1], vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("factor");

        let on_a = factor.reduce(0, 1);
        assert_eq!(on_a.scope(), &[1]);
        assert!(approx_eq(on_a.values(), &[4.0, 5.0, 6.0]));

        let on_b = factor.reduce(1, 2);
        assert_eq!(on_b.scope(), &[0]);
        assert!(approx_eq(on_b.values(), &[3.0, 6.0]));
    }

    #[test]
    fn marginalize_sums_out_variable() {
        let factor =
            Factor::new(vec![0, 1], vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("factor");

        assert!(approx_eq(factor.marginalize(0).values(), &[5.0, 7.0, 9.0]));
        assert!(approx_eq(factor.marginalize(1).values(), &[6.0, 15.0]));
        assert!(approx_eq(factor.marginalize(0).marginalize(1).values(), &[21.0]));
    }

    #[test]
    fn product_aligns_shared_variables() {
        let a = Factor::new(vec![0, 1], vec![2, 2], vec![0.5, 0.8, 0.1, 0.3]).expect("a");
        let b = Factor::new(vec![1, 2], vec![2, 2], vec![0.5, 0.7, 0.1, 0.2]).expect("b");

        let product = a.product(&b);
        assert_eq!(product.scope(), &[0, 1, 2]);
        assert!(approx_eq(
            product.values(),
            &[0.25, 0.35, 0.08, 0.16, 0.05, 0.07, 0.03, 0.06]
        ));
    }

    #[test]
    fn scalar_product_scales_values() {
        let factor = Factor::new(vec![3], vec![2], vec![0.2, 0.8]).expect("factor");
        let scaled = Factor::scalar(0.5).product(&factor);
        assert_eq!(scaled.scope(), &[3]);
        assert!(approx_eq(scaled.values(), &[0.1, 0.4]));
    }

    #[test]
    fn new_rejects_mismatched_shapes() {
        assert!(Factor::new(vec![0], vec![3], vec![1.0, 2.0]).is_err());
        assert!(Factor::new(vec![0, 1], vec![3], vec![1.0, 2.0, 3.0]).is_err());
    }
}
