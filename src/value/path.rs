//! Dotted-path convenience access on top of [`super::Value`]'s plain
//! `at`/index accessors (`v["a"]["b"][2]`, chained, already satisfies the
//! testable "path access" property on its own — this module only adds a
//! string-path shorthand for callers that build paths dynamically).
use crate::error::{Error, ErrorKind, Result};
use crate::value::Value;

enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn segments(path: &str) -> Vec<Segment<'_>> {
    path.split('.')
        .map(|part| match part.parse::<usize>() {
            Ok(i) => Segment::Index(i),
            Err(_) => Segment::Key(part),
        })
        .collect()
}

/// Read a value at a dotted path such as `"a.b.2.c"` (numeric components
/// index an array, others key into an object).
pub fn get<'a>(root: &'a Value, path: &str) -> Result<&'a Value> {
    let mut current = root;
    for segment in segments(path) {
        current = match segment {
            Segment::Key(k) => current.at(k)?,
            Segment::Index(i) => current
                .get_array()?
                .get(i)
                .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("index {} out of range", i)))?,
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;

    #[test]
    fn dotted_path_descends_objects_and_arrays() {
        let mut inner = Object::new();
        inner.insert("c", Value::Int32(7));
        let arr = Value::Array(vec![Value::Null, Value::Object(inner)]);
        let mut root_obj = Object::new();
        root_obj.insert("b", arr);
        let root = Value::Object(root_obj);

        assert_eq!(get(&root, "b.1.c").unwrap(), &Value::Int32(7));
    }
}
