//! Accumulators for aggregate functions.

use crate::evaluator::EvalError;
use crate::expr::AggregateFunc;
use crate::value::Value;

/// Running state of one aggregate over one group.
#[derive(Debug, Clone)]
pub struct Accumulator {
    /// The aggregate function.
    func: AggregateFunc,
    /// Accumulated state.
    state: AccumulatorState,
}

/// Running sum that stays integral until a floating input arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SumState {
    Empty,
    Integral(i64),
    Floating(f64),
}

/// State for different aggregate functions.
#[derive(Debug, Clone)]
enum AccumulatorState {
    Count(i64),
    Sum(SumState),
    Avg { sum: f64, count: i64 },
    Min(Option<Value>),
    Max(Option<Value>),
    First(Option<Value>),
    Last(Option<Value>),
}

impl AccumulatorState {
    fn initial(func: AggregateFunc) -> Self {
        match func {
            AggregateFunc::Count | AggregateFunc::CountStar => AccumulatorState::Count(0),
            AggregateFunc::Sum => AccumulatorState::Sum(SumState::Empty),
            AggregateFunc::Avg => AccumulatorState::Avg { sum: 0.0, count: 0 },
            AggregateFunc::Min => AccumulatorState::Min(None),
            AggregateFunc::Max => AccumulatorState::Max(None),
            AggregateFunc::First => AccumulatorState::First(None),
            AggregateFunc::Last => AccumulatorState::Last(None),
        }
    }
}

impl Accumulator {
    /// Creates a new accumulator for the given function.
    pub fn new(func: AggregateFunc) -> Self {
        Self {
            func,
            state: AccumulatorState::initial(func),
        }
    }

    /// Returns the aggregate function.
    pub fn func(&self) -> AggregateFunc {
        self.func
    }

    /// Accumulates a value.
    ///
    /// NULL inputs are skipped by every function except `CountStar`.
    pub fn accumulate(&mut self, value: &Value) -> Result<(), EvalError> {
        if value.is_null() && self.func != AggregateFunc::CountStar {
            return Ok(());
        }

        match &mut self.state {
            AccumulatorState::Count(count) => {
                *count += 1;
            }
            AccumulatorState::Sum(sum) => {
                *sum = add_to_sum(*sum, value)?;
            }
            AccumulatorState::Avg { sum, count } => {
                let v = value
                    .to_f64()
                    .ok_or_else(|| EvalError::TypeMismatch(format!("avg({})", value)))?;
                *sum += v;
                *count += 1;
            }
            AccumulatorState::Min(min) => {
                if min.as_ref().map_or(true, |m| value < m) {
                    *min = Some(value.clone());
                }
            }
            AccumulatorState::Max(max) => {
                if max.as_ref().map_or(true, |m| value > m) {
                    *max = Some(value.clone());
                }
            }
            AccumulatorState::First(first) => {
                if first.is_none() {
                    *first = Some(value.clone());
                }
            }
            AccumulatorState::Last(last) => {
                *last = Some(value.clone());
            }
        }
        Ok(())
    }

    /// Returns the final result.
    pub fn result(&self) -> Value {
        match &self.state {
            AccumulatorState::Count(count) => Value::BigInt(*count),
            AccumulatorState::Sum(SumState::Empty) => Value::Null,
            AccumulatorState::Sum(SumState::Integral(v)) => Value::BigInt(*v),
            AccumulatorState::Sum(SumState::Floating(v)) => Value::Double(*v),
            AccumulatorState::Avg { sum, count } => {
                if *count == 0 {
                    Value::Null
                } else {
                    Value::Double(*sum / *count as f64)
                }
            }
            AccumulatorState::Min(v)
            | AccumulatorState::Max(v)
            | AccumulatorState::First(v)
            | AccumulatorState::Last(v) => v.clone().unwrap_or(Value::Null),
        }
    }

    /// Resets the accumulator.
    pub fn reset(&mut self) {
        self.state = AccumulatorState::initial(self.func);
    }
}

fn add_to_sum(sum: SumState, value: &Value) -> Result<SumState, EvalError> {
    let mismatch = || EvalError::TypeMismatch(format!("sum({})", value));

    if value.is_integral() {
        let v = value.to_i64().ok_or_else(mismatch)?;
        return match sum {
            SumState::Empty => Ok(SumState::Integral(v)),
            SumState::Integral(acc) => acc
                .checked_add(v)
                .map(SumState::Integral)
                .ok_or_else(|| EvalError::Overflow(format!("sum {} + {}", acc, v))),
            SumState::Floating(acc) => Ok(SumState::Floating(acc + v as f64)),
        };
    }

    if value.is_floating() {
        let v = value.to_f64().ok_or_else(mismatch)?;
        return Ok(match sum {
            SumState::Empty => SumState::Floating(v),
            SumState::Integral(acc) => SumState::Floating(acc as f64 + v),
            SumState::Floating(acc) => SumState::Floating(acc + v),
        });
    }

    Err(mismatch())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_count() {
        let mut acc = Accumulator::new(AggregateFunc::Count);
        acc.accumulate(&Value::int(1)).unwrap();
        acc.accumulate(&Value::Null).unwrap();
        acc.accumulate(&Value::int(3)).unwrap();
        assert_eq!(acc.result(), Value::BigInt(2));
    }

    #[test]
    fn test_accumulator_count_star_counts_nulls() {
        let mut acc = Accumulator::new(AggregateFunc::CountStar);
        acc.accumulate(&Value::Null).unwrap();
        acc.accumulate(&Value::int(3)).unwrap();
        assert_eq!(acc.result(), Value::BigInt(2));
    }

    #[test]
    fn test_accumulator_sum_integral() {
        let mut acc = Accumulator::new(AggregateFunc::Sum);
        for _ in 0..4 {
            acc.accumulate(&Value::bigint(143)).unwrap();
        }
        assert_eq!(acc.result(), Value::BigInt(572));
    }

    #[test]
    fn test_accumulator_sum_promotes() {
        let mut acc = Accumulator::new(AggregateFunc::Sum);
        acc.accumulate(&Value::int(10)).unwrap();
        acc.accumulate(&Value::double(0.5)).unwrap();
        acc.accumulate(&Value::int(1)).unwrap();
        assert_eq!(acc.result(), Value::Double(11.5));
    }

    #[test]
    fn test_accumulator_sum_empty_is_null() {
        let mut acc = Accumulator::new(AggregateFunc::Sum);
        acc.accumulate(&Value::Null).unwrap();
        assert_eq!(acc.result(), Value::Null);
    }

    #[test]
    fn test_accumulator_sum_rejects_text() {
        let mut acc = Accumulator::new(AggregateFunc::Sum);
        assert!(acc.accumulate(&Value::string("x")).is_err());
    }

    #[test]
    fn test_accumulator_sum_overflow() {
        let mut acc = Accumulator::new(AggregateFunc::Sum);
        acc.accumulate(&Value::bigint(i64::MAX)).unwrap();
        assert!(matches!(acc.accumulate(&Value::int(1)), Err(EvalError::Overflow(_))));
    }

    #[test]
    fn test_accumulator_avg() {
        let mut acc = Accumulator::new(AggregateFunc::Avg);
        acc.accumulate(&Value::int(10)).unwrap();
        acc.accumulate(&Value::int(20)).unwrap();
        acc.accumulate(&Value::int(30)).unwrap();
        assert_eq!(acc.result(), Value::Double(20.0));
    }

    #[test]
    fn test_accumulator_min_max() {
        let mut min = Accumulator::new(AggregateFunc::Min);
        let mut max = Accumulator::new(AggregateFunc::Max);
        for v in [30, 10, 20] {
            min.accumulate(&Value::int(v)).unwrap();
            max.accumulate(&Value::int(v)).unwrap();
        }
        assert_eq!(min.result(), Value::Int(10));
        assert_eq!(max.result(), Value::Int(30));
    }

    #[test]
    fn test_accumulator_first_last() {
        let mut first = Accumulator::new(AggregateFunc::First);
        let mut last = Accumulator::new(AggregateFunc::Last);
        for v in ["a", "b", "c"] {
            first.accumulate(&Value::string(v)).unwrap();
            last.accumulate(&Value::string(v)).unwrap();
        }
        assert_eq!(first.result(), Value::string("a"));
        assert_eq!(last.result(), Value::string("c"));
    }

    #[test]
    fn test_reset() {
        let mut acc = Accumulator::new(AggregateFunc::Sum);
        acc.accumulate(&Value::int(5)).unwrap();
        acc.reset();
        assert_eq!(acc.result(), Value::Null);
        acc.accumulate(&Value::int(2)).unwrap();
        assert_eq!(acc.result(), Value::BigInt(2));
    }
}
