use std::io::Write;

use serde::Serialize;
use serde_json::Number;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Object { empty: bool, key_pending: bool },
    Array { empty: bool },
}

/// Incremental JSON writer bound to one response sink.
///
/// Values are written to the sink in call order; only the stack of currently
/// open containers is kept in memory. The document is exactly one root
/// value: a container or a single [`write_value`](Self::write_value).
/// Every structural violation (a key outside an object, a value without a
/// key, a mismatched `end_*`, a scalar with no open container, a second
/// root value) fails with [`ErrorKind::Internal`] and writes nothing.
///
/// A failed write to the sink poisons the stream: the bytes already written
/// may end in the middle of a token, so every later call fails too.
///
/// ```rust
/// # use krpc::OutputJsonStream;
/// let mut buf = Vec::new();
/// let mut out = OutputJsonStream::new(&mut buf);
/// out.begin_object().unwrap();
/// out.write_key("name").unwrap();
/// out.write_string("ServiceInfo").unwrap();
/// out.end_object().unwrap();
/// assert!(out.is_complete());
/// assert_eq!(buf, br#"{"name":"ServiceInfo"}"#);
/// ```
///
/// [`ErrorKind::Internal`]: crate::ErrorKind::Internal
pub struct OutputJsonStream<'a> {
    sink: &'a mut dyn Write,
    scopes: Vec<Scope>,
    complete: bool,
    poisoned: bool,
}

impl<'a> OutputJsonStream<'a> {
    pub fn new(sink: &'a mut dyn Write) -> Self {
        Self {
            sink,
            scopes: Vec::new(),
            complete: false,
            poisoned: false,
        }
    }

    /// Number of currently open containers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Whether a root value has been fully written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete && !self.poisoned
    }

    /// Checks that the output is a well-formed document so far.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if any container is still open or a sink write
    /// failed.
    pub fn finish(&self) -> Result<()> {
        self.check_usable("finish")?;
        if self.scopes.is_empty() {
            Ok(())
        } else {
            Err(Error::internal(format!(
                "output left {} container(s) open",
                self.scopes.len()
            )))
        }
    }

    /// # Errors
    ///
    /// Fails where no value may start, or if the sink fails.
    pub fn begin_object(&mut self) -> Result<()> {
        let sep = self.enter_value("begin_object", true)?;
        self.write_raw(sep)?;
        self.write_raw("{")?;
        self.scopes.push(Scope::Object {
            empty: true,
            key_pending: false,
        });
        Ok(())
    }

    /// # Errors
    ///
    /// Fails unless the innermost open container is an object with no key
    /// waiting for its value, or if the sink fails.
    pub fn end_object(&mut self) -> Result<()> {
        self.check_usable("end_object")?;
        match self.scopes.last() {
            Some(Scope::Object {
                key_pending: false, ..
            }) => {}
            Some(Scope::Object { .. }) => {
                return Err(Error::internal("end_object after a key without a value"));
            }
            Some(Scope::Array { .. }) => {
                return Err(Error::internal("end_object inside an array"));
            }
            None => return Err(Error::internal("end_object without begin_object")),
        }
        self.write_raw("}")?;
        self.scopes.pop();
        self.leave_value();
        Ok(())
    }

    /// # Errors
    ///
    /// Fails where no value may start, or if the sink fails.
    pub fn begin_array(&mut self) -> Result<()> {
        let sep = self.enter_value("begin_array", true)?;
        self.write_raw(sep)?;
        self.write_raw("[")?;
        self.scopes.push(Scope::Array { empty: true });
        Ok(())
    }

    /// # Errors
    ///
    /// Fails unless the innermost open container is an array, or if the
    /// sink fails.
    pub fn end_array(&mut self) -> Result<()> {
        self.check_usable("end_array")?;
        match self.scopes.last() {
            Some(Scope::Array { .. }) => {}
            Some(Scope::Object { .. }) => {
                return Err(Error::internal("end_array inside an object"));
            }
            None => return Err(Error::internal("end_array without begin_array")),
        }
        self.write_raw("]")?;
        self.scopes.pop();
        self.leave_value();
        Ok(())
    }

    /// Writes an object key. Exactly one value write must follow.
    ///
    /// # Errors
    ///
    /// Fails outside an object or while another key is still waiting for
    /// its value.
    pub fn write_key(&mut self, name: &str) -> Result<()> {
        self.check_usable("write_key")?;
        let sep = match self.scopes.last_mut() {
            Some(Scope::Object { empty, key_pending }) if !*key_pending => {
                let sep = if *empty { "" } else { "," };
                *empty = false;
                *key_pending = true;
                sep
            }
            Some(Scope::Object { .. }) => {
                return Err(Error::internal(format!(
                    "write_key({name}) after a key without a value"
                )));
            }
            _ => {
                return Err(Error::internal(format!(
                    "write_key({name}) outside of an object"
                )));
            }
        };
        self.write_raw(sep)?;
        self.write_json(name)?;
        self.write_raw(":")
    }

    /// # Errors
    ///
    /// Fails at the root or where no value may start, or if the sink fails.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let sep = self.enter_value("write_string", false)?;
        self.write_raw(sep)?;
        self.write_json(value)?;
        self.leave_value();
        Ok(())
    }

    /// # Errors
    ///
    /// Fails at the root or where no value may start, or if the sink fails.
    pub fn write_number(&mut self, value: impl Into<Number>) -> Result<()> {
        let sep = self.enter_value("write_number", false)?;
        self.write_raw(sep)?;
        self.write_raw(&value.into().to_string())?;
        self.leave_value();
        Ok(())
    }

    /// # Errors
    ///
    /// Non-finite values have no JSON representation and are rejected.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        let number = Number::from_f64(value)
            .ok_or_else(|| Error::internal(format!("non-finite number: {value}")))?;
        self.write_number(number)
    }

    /// # Errors
    ///
    /// Fails at the root or where no value may start, or if the sink fails.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        let sep = self.enter_value("write_bool", false)?;
        self.write_raw(sep)?;
        self.write_raw(if value { "true" } else { "false" })?;
        self.leave_value();
        Ok(())
    }

    /// # Errors
    ///
    /// Fails at the root or where no value may start, or if the sink fails.
    pub fn write_null(&mut self) -> Result<()> {
        let sep = self.enter_value("write_null", false)?;
        self.write_raw(sep)?;
        self.write_raw("null")?;
        self.leave_value();
        Ok(())
    }

    /// Serializes one complete value at the current position.
    ///
    /// Unlike the scalar writers this is also accepted at the root, where
    /// it forms the whole document, so a method returning a single number
    /// or string writes it through here.
    ///
    /// # Errors
    ///
    /// Fails where no value may start, if `value` cannot be serialized, or
    /// if the sink fails.
    pub fn write_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let sep = self.enter_value("write_value", true)?;
        self.write_raw(sep)?;
        self.write_json(value)?;
        self.leave_value();
        Ok(())
    }

    fn check_usable(&self, op: &str) -> Result<()> {
        if self.poisoned {
            Err(Error::internal(format!("{op} after a failed write")))
        } else {
            Ok(())
        }
    }

    /// Claims the next value position and returns the separator preceding it.
    fn enter_value(&mut self, op: &str, at_root: bool) -> Result<&'static str> {
        self.check_usable(op)?;
        match self.scopes.last_mut() {
            None if self.complete => Err(Error::internal(format!(
                "{op} after the document is complete"
            ))),
            None if at_root => Ok(""),
            None => Err(Error::internal(format!("{op} outside of an open container"))),
            Some(Scope::Array { empty }) => {
                let sep = if *empty { "" } else { "," };
                *empty = false;
                Ok(sep)
            }
            Some(Scope::Object { key_pending, .. }) => {
                if *key_pending {
                    *key_pending = false;
                    Ok("")
                } else {
                    Err(Error::internal(format!("{op} in an object without a key")))
                }
            }
        }
    }

    fn leave_value(&mut self) {
        if self.scopes.is_empty() {
            self.complete = true;
        }
    }

    fn write_raw(&mut self, s: &str) -> Result<()> {
        if let Err(err) = self.sink.write_all(s.as_bytes()) {
            self.poisoned = true;
            return Err(err.into());
        }
        Ok(())
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut *self.sink, value).map_err(|e| {
            self.poisoned = true;
            Error::internal(e.to_string())
        })
    }
}

impl std::fmt::Debug for OutputJsonStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputJsonStream")
            .field("scopes", &self.scopes)
            .field("complete", &self.complete)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn render(f: impl FnOnce(&mut OutputJsonStream) -> Result<()>) -> String {
        let mut buf = Vec::new();
        let mut out = OutputJsonStream::new(&mut buf);
        f(&mut out).unwrap();
        out.finish().unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_write_key_outside_object() {
        let mut buf = Vec::new();
        let mut out = OutputJsonStream::new(&mut buf);
        let err = out.write_key("name").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);

        out.begin_array().unwrap();
        out.write_key("name").unwrap_err();
        out.end_array().unwrap();
        assert_eq!(buf, b"[]");
    }

    #[test]
    fn test_mismatched_end() {
        let mut buf = Vec::new();
        let mut out = OutputJsonStream::new(&mut buf);
        assert_eq!(out.end_object().unwrap_err().kind, ErrorKind::Internal);
        assert_eq!(out.end_array().unwrap_err().kind, ErrorKind::Internal);

        out.begin_array().unwrap();
        out.end_object().unwrap_err();
        out.begin_object().unwrap();
        out.end_array().unwrap_err();
        out.write_key("k").unwrap();
        out.end_object().unwrap_err();
        out.write_null().unwrap();
        out.end_object().unwrap();
        out.end_array().unwrap();
        assert!(out.is_complete());
        assert_eq!(buf, br#"[{"k":null}]"#);
    }

    #[test]
    fn test_value_position_rules() {
        let mut buf = Vec::new();
        let mut out = OutputJsonStream::new(&mut buf);
        out.write_string("root").unwrap_err();
        out.write_bool(true).unwrap_err();
        out.write_number(1).unwrap_err();

        out.begin_object().unwrap();
        out.write_string("no key").unwrap_err();
        out.write_key("a").unwrap();
        out.write_key("b").unwrap_err();
        out.write_number(1).unwrap();
        out.write_number(2).unwrap_err();
        out.end_object().unwrap();

        out.begin_array().unwrap_err();
        out.write_value(&1).unwrap_err();
        assert_eq!(buf, br#"{"a":1}"#);
    }

    #[test]
    fn test_scalars() {
        let json = render(|out| {
            out.begin_array()?;
            out.write_string("quote \" and \\ and \n")?;
            out.write_number(-7i64)?;
            out.write_number(u64::MAX)?;
            out.write_f64(1.5)?;
            out.write_bool(false)?;
            out.write_null()?;
            out.end_array()
        });
        assert_eq!(
            json,
            r#"["quote \" and \\ and \n",-7,18446744073709551615,1.5,false,null]"#
        );
    }

    #[test]
    fn test_non_finite_number() {
        let mut buf = Vec::new();
        let mut out = OutputJsonStream::new(&mut buf);
        out.begin_array().unwrap();
        assert_eq!(
            out.write_f64(f64::NAN).unwrap_err().kind,
            ErrorKind::Internal
        );
        out.write_f64(f64::INFINITY).unwrap_err();
        out.end_array().unwrap();
        assert_eq!(buf, b"[]");
    }

    #[test]
    fn test_deep_nesting() {
        const DEPTH: usize = 64;
        let json = render(|out| {
            for i in 0..DEPTH {
                if i % 2 == 0 {
                    out.begin_array()?;
                    out.write_number(i)?;
                } else {
                    out.begin_object()?;
                    out.write_key(&format!("k{i}"))?;
                }
            }
            out.write_null()?;
            for i in (0..DEPTH).rev() {
                if i % 2 == 0 {
                    out.end_array()?;
                } else {
                    out.end_object()?;
                }
            }
            Ok(())
        });

        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for i in 0..DEPTH {
            value = if i % 2 == 0 {
                assert_eq!(value[0], i);
                value[1].take()
            } else {
                value[format!("k{i}")].take()
            };
        }
        assert!(value.is_null());
    }

    #[test]
    fn test_write_value() {
        let json = render(|out| {
            out.begin_object()?;
            out.write_key("list")?;
            out.write_value(&vec![1, 2, 3])?;
            out.write_key("map")?;
            out.write_value(&serde_json::json!({"x": "y"}))?;
            out.end_object()
        });
        assert_eq!(json, r#"{"list":[1,2,3],"map":{"x":"y"}}"#);

        let json = render(|out| out.write_value("root"));
        assert_eq!(json, r#""root""#);
    }

    #[test]
    fn test_single_root_value() {
        assert_eq!(render(|out| out.write_value(&5)), "5");
        assert_eq!(render(|out| out.write_value(&None::<u8>)), "null");

        let mut buf = Vec::new();
        let mut out = OutputJsonStream::new(&mut buf);
        for err in [
            out.write_number(1).unwrap_err(),
            out.write_string("s").unwrap_err(),
            out.write_bool(true).unwrap_err(),
            out.write_null().unwrap_err(),
            out.write_f64(0.5).unwrap_err(),
        ] {
            assert_eq!(err.kind, ErrorKind::Internal);
        }
        assert!(!out.is_complete());

        out.write_value(&1).unwrap();
        assert!(out.is_complete());
        for err in [
            out.write_value(&2).unwrap_err(),
            out.begin_array().unwrap_err(),
            out.begin_object().unwrap_err(),
        ] {
            assert_eq!(err.kind, ErrorKind::Internal);
        }
        assert_eq!(buf, b"1");
    }

    #[test]
    fn test_finish_with_open_containers() {
        let mut buf = Vec::new();
        let mut out = OutputJsonStream::new(&mut buf);
        out.finish().unwrap();
        out.begin_array().unwrap();
        out.begin_object().unwrap();
        assert_eq!(out.depth(), 2);
        let err = out.finish().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(!out.is_complete());
    }

    #[test]
    fn test_sink_failure() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("connection reset"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut sink = Broken;
        let mut out = OutputJsonStream::new(&mut sink);
        let err = out.begin_array().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.msg.contains("connection reset"));
    }

    #[test]
    fn test_stream_fails_after_transient_sink_error() {
        struct FailOnBrace(Vec<u8>, bool);

        impl Write for FailOnBrace {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if buf == b"{" && !self.1 {
                    self.1 = true;
                    return Err(std::io::Error::other("transient"));
                }
                self.0.extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut sink = FailOnBrace(Vec::new(), false);
        let mut out = OutputJsonStream::new(&mut sink);
        out.begin_array().unwrap();
        out.begin_object().unwrap_err();
        for err in [
            out.write_string("x").unwrap_err(),
            out.begin_object().unwrap_err(),
            out.write_key("k").unwrap_err(),
            out.end_object().unwrap_err(),
            out.end_array().unwrap_err(),
            out.finish().unwrap_err(),
        ] {
            assert_eq!(err.kind, ErrorKind::Internal);
        }
        assert!(!out.is_complete());
        assert_eq!(sink.0, b"[");
    }
}
