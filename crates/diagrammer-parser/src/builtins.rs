//! Pure helper functions scripts may call.

use std::cmp::Ordering;

use diagrammer_core::capability::Builtin;

use crate::{
    error::ErrorCode,
    value::{Value, format_number},
    vm::{Arguments, Fault, Limits, Outcome, type_error},
};

pub(crate) fn call(builtin: Builtin, args: Arguments, limits: &Limits) -> Outcome<Value> {
    match builtin {
        Builtin::Len => len(args),
        Builtin::Range => range(args, limits),
        Builtin::Min => extreme(args, Ordering::Less),
        Builtin::Max => extreme(args, Ordering::Greater),
        Builtin::Abs => abs(args),
        Builtin::Str => to_str(args, limits),
    }
}

fn len(args: Arguments) -> Outcome<Value> {
    let [value] = exactly(args.positional_only(1, 1)?)?;
    let count = match &value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Dict(entries) => entries.len(),
        other => {
            return Err(type_error(format!(
                "{} has no len()",
                other.type_name()
            )));
        }
    };
    Ok(Value::Number(count as f64))
}

fn integer(value: &Value, callee: &str) -> Outcome<i64> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Ok(*n as i64),
        other => Err(type_error(format!(
            "`{callee}` expects integers, got {}",
            match other {
                Value::Number(n) => format_number(*n),
                other => other.type_name().to_string(),
            }
        ))),
    }
}

fn range(args: Arguments, limits: &Limits) -> Outcome<Value> {
    let callee = args.callee();
    let values = args.positional_only(1, 3)?;
    let numbers = values
        .iter()
        .map(|v| integer(v, callee))
        .collect::<Outcome<Vec<i64>>>()?;

    let (start, stop, step) = match numbers.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => unreachable_arity(callee)?,
    };
    if step == 0 {
        return Err(Fault::new(ErrorCode::E304, "`range` step must not be zero"));
    }

    let span = if step > 0 { stop - start } else { start - stop };
    let count = if span <= 0 {
        0
    } else {
        ((span - 1) / step.abs() + 1) as usize
    };
    if count > limits.max_list_len {
        return Err(Fault::new(
            ErrorCode::E306,
            format!(
                "range of {count} items exceeds the limit of {}",
                limits.max_list_len
            ),
        ));
    }

    let items: Vec<Value> = (0..count as i64)
        .map(|i| Value::Number((start + i * step) as f64))
        .collect();
    Ok(Value::list(items))
}

/// `min`/`max` over either one list argument or several arguments.
fn extreme(args: Arguments, keep: Ordering) -> Outcome<Value> {
    let callee = args.callee();
    let values = args.positional_only(1, usize::MAX)?;
    let candidates: Vec<Value> = match <[Value; 1]>::try_from(values) {
        Ok([Value::List(items)]) => items.to_vec(),
        Ok([other]) => vec![other],
        Err(values) => values,
    };

    let mut best: Option<Value> = None;
    for candidate in candidates {
        best = Some(match best {
            None => candidate,
            Some(current) => {
                let ordering = match (&candidate, &current) {
                    (Value::Number(a), Value::Number(b)) => {
                        a.partial_cmp(b).unwrap_or(Ordering::Equal)
                    }
                    (Value::Str(a), Value::Str(b)) => a.cmp(b),
                    (a, b) => {
                        return Err(type_error(format!(
                            "`{callee}` cannot compare {} and {}",
                            a.type_name(),
                            b.type_name()
                        )));
                    }
                };
                if ordering == keep { candidate } else { current }
            }
        });
    }

    best.ok_or_else(|| {
        Fault::new(
            ErrorCode::E304,
            format!("`{callee}` of an empty sequence"),
        )
    })
}

fn abs(args: Arguments) -> Outcome<Value> {
    match exactly(args.positional_only(1, 1)?)? {
        [Value::Number(n)] => Ok(Value::Number(n.abs())),
        [other] => Err(type_error(format!(
            "bad operand type for abs(): {}",
            other.type_name()
        ))),
    }
}

fn to_str(args: Arguments, limits: &Limits) -> Outcome<Value> {
    let [value] = exactly(args.positional_only(1, 1)?)?;
    let text = value.to_string();
    if text.len() > limits.max_string_len {
        return Err(Fault::new(
            ErrorCode::E306,
            format!(
                "string of {} bytes exceeds the limit of {}",
                text.len(),
                limits.max_string_len
            ),
        ));
    }
    Ok(Value::str(text))
}

fn exactly<const N: usize>(values: Vec<Value>) -> Outcome<[Value; N]> {
    values
        .try_into()
        .map_err(|_| type_error("internal error: argument count mismatch"))
}

fn unreachable_arity(callee: &str) -> Outcome<(i64, i64, i64)> {
    Err(type_error(format!(
        "internal error: unexpected arity for `{callee}`"
    )))
}
