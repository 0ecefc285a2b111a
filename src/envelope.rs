//! The API's `{ errcode, errmsg, data }` response envelope and its unwrapping rules.

// self
use crate::{_prelude::*, error::ApiError};

/// Numeric envelope status code (`errcode`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i64);
impl ErrorCode {
	/// The call succeeded.
	pub const SUCCESS: Self = Self(0);
	/// The server rejected the token; refresh and retry.
	pub const TOKEN_INVALID: Self = Self(31);
	/// An `errcode` was present but is not a number; always a terminal failure.
	pub const UNRECOGNIZED: Self = Self(-1);

	/// Reads a code from its JSON form.
	///
	/// Integers, integral floats (`31.0`) and numeric strings (`"1002"`) are accepted.
	pub fn from_json(raw: &Value) -> Option<Self> {
		let code = match raw {
			Value::Number(number) => number.as_i64().or_else(|| {
				number
					.as_f64()
					.filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
					.map(|float| float as i64)
			}),
			Value::String(text) => text.trim().parse().ok(),
			_ => None,
		};

		code.map(Self)
	}

	/// Returns `true` for [`ErrorCode::SUCCESS`].
	pub const fn is_success(self) -> bool {
		self.0 == Self::SUCCESS.0
	}

	/// Returns `true` for [`ErrorCode::TOKEN_INVALID`].
	pub const fn is_token_invalid(self) -> bool {
		self.0 == Self::TOKEN_INVALID.0
	}
}
impl Display for ErrorCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}

/// Decoded response envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	/// Status code; `0` means success.
	pub errcode: ErrorCode,
	/// Server-supplied message.
	#[serde(default)]
	pub errmsg: String,
	/// Endpoint payload.
	#[serde(default)]
	pub data: Value,
}
impl Envelope {
	/// Recognizes an envelope inside a decoded body.
	///
	/// Returns `None` when the body is not an object or has no `errcode` key; such bodies are
	/// passed through untouched. A present `errcode` that is not numeric is read as
	/// [`ErrorCode::UNRECOGNIZED`].
	pub fn recognize(body: &Value) -> Option<Self> {
		let object = body.as_object()?;
		let raw_code = object.get("errcode")?;
		let errcode = ErrorCode::from_json(raw_code);
		let errmsg = match object.get("errmsg") {
			Some(Value::String(message)) => message.clone(),
			Some(Value::Null) | None => String::new(),
			Some(other) => other.to_string(),
		};
		let (errcode, errmsg) = match errcode {
			Some(code) => (code, errmsg),
			None if errmsg.is_empty() =>
				(ErrorCode::UNRECOGNIZED, format!("Unrecognized errcode `{raw_code}`")),
			None => (ErrorCode::UNRECOGNIZED, errmsg),
		};
		let data = object.get("data").cloned().unwrap_or(Value::Null);

		Some(Self { errcode, errmsg, data })
	}

	/// Maps the envelope onto the response state machine.
	pub fn into_disposition(self) -> Disposition {
		if self.errcode.is_success() {
			return Disposition::Success(pick_data(self.data));
		}

		let err = ApiError::new(self.errcode, self.errmsg, self.data);

		if self.errcode.is_token_invalid() {
			Disposition::TokenInvalid(err)
		} else {
			Disposition::Failure(err)
		}
	}
}

/// Outcome of classifying an [`Envelope`].
#[derive(Clone, Debug, PartialEq)]
pub enum Disposition {
	/// Success with the unwrapped payload.
	Success(Value),
	/// The token was rejected; refresh and retry once.
	TokenInvalid(ApiError),
	/// Terminal application error; surface without retry.
	Failure(ApiError),
}

/// Collapses single-field payloads.
///
/// An object with exactly one key is replaced by that key's value; anything else is returned
/// as-is. Endpoints that legitimately return a one-field object lose the field name, so
/// callers that need the wrapper should read the raw envelope instead.
pub fn pick_data(data: Value) -> Value {
	match data {
		Value::Object(map) if map.len() == 1 =>
			map.into_iter().next().map(|(_, value)| value).unwrap_or(Value::Null),
		other => other,
	}
}

/// Decodes a raw response body: empty becomes `null`, invalid JSON becomes a string.
pub fn decode_body(bytes: &[u8]) -> Value {
	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Value::Null;
	}

	serde_json::from_slice(bytes)
		.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn single_key_payloads_unwrap() {
		assert_eq!(pick_data(json!({"foo": "bar"})), json!("bar"));
		assert_eq!(pick_data(json!({"user": {"id": 1, "name": "a"}})), json!({"id": 1, "name": "a"}));
	}

	#[test]
	fn other_payloads_pass_through() {
		assert_eq!(pick_data(json!({"foo": 1, "baz": 2})), json!({"foo": 1, "baz": 2}));
		assert_eq!(pick_data(json!({})), json!({}));
		assert_eq!(pick_data(json!([1])), json!([1]));
		assert_eq!(pick_data(json!("text")), json!("text"));
		assert_eq!(pick_data(Value::Null), Value::Null);
	}

	#[test]
	fn recognize_requires_an_errcode_key() {
		assert!(Envelope::recognize(&json!({"data": 1})).is_none());
		assert!(Envelope::recognize(&json!([{"errcode": 0}])).is_none());
		assert!(Envelope::recognize(&json!("plain")).is_none());

		let envelope = Envelope::recognize(&json!({"errcode": 0}))
			.expect("An integer errcode should be recognized.");

		assert_eq!(envelope.errmsg, "");
		assert_eq!(envelope.data, Value::Null);
	}

	#[test]
	fn numeric_errcodes_parse_leniently() {
		let code = |raw: Value| {
			Envelope::recognize(&json!({"errcode": raw, "errmsg": "m"}))
				.expect("A present errcode should be recognized.")
				.errcode
		};

		assert_eq!(code(json!("1002")), ErrorCode(1002));
		assert_eq!(code(json!(" 0 ")), ErrorCode::SUCCESS);
		assert_eq!(code(json!(31.0)), ErrorCode::TOKEN_INVALID);
		assert_eq!(code(json!(1.5)), ErrorCode::UNRECOGNIZED);
		assert_eq!(code(json!(true)), ErrorCode::UNRECOGNIZED);
		assert_eq!(code(Value::Null), ErrorCode::UNRECOGNIZED);
	}

	#[test]
	fn unrecognized_errcodes_are_terminal_failures() {
		let disposition = Envelope::recognize(&json!({"errcode": "oops", "data": {"a": 1, "b": 2}}))
			.expect("A present errcode should be recognized.")
			.into_disposition();

		assert_eq!(
			disposition,
			Disposition::Failure(ApiError::new(
				ErrorCode::UNRECOGNIZED,
				"Unrecognized errcode `\"oops\"`",
				json!({"a": 1, "b": 2})
			))
		);
	}

	#[test]
	fn dispositions_follow_errcode() {
		let success = Envelope::recognize(&json!({"errcode": 0, "errmsg": "ok", "data": {"foo": "bar"}}))
			.expect("Success envelope should be recognized.");

		assert_eq!(success.into_disposition(), Disposition::Success(json!("bar")));

		let invalid =
			Envelope::recognize(&json!({"errcode": 31, "errmsg": "token invalid", "data": null}))
				.expect("Token-invalid envelope should be recognized.");

		assert!(matches!(
			invalid.into_disposition(),
			Disposition::TokenInvalid(ApiError { code: ErrorCode::TOKEN_INVALID, .. })
		));

		let failure =
			Envelope::recognize(&json!({"errcode": 40, "errmsg": "denied", "data": {"a": 1, "b": 2}}))
				.expect("Failure envelope should be recognized.");

		assert_eq!(
			failure.into_disposition(),
			Disposition::Failure(ApiError::new(ErrorCode(40), "denied", json!({"a": 1, "b": 2})))
		);
	}

	#[test]
	fn bodies_decode_leniently() {
		assert_eq!(decode_body(b""), Value::Null);
		assert_eq!(decode_body(b"  \n"), Value::Null);
		assert_eq!(decode_body(br#"{"errcode":0}"#), json!({"errcode": 0}));
		assert_eq!(decode_body(b"<html>oops</html>"), json!("<html>oops</html>"));
	}
}
