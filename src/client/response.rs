//! Response interceptor: unwrap envelopes, replay once after a token-invalid signal.

// self
use crate::{
	_prelude::*,
	client::Client,
	envelope::{self, Disposition, Envelope},
	http::{ApiRequest, ApiTransport, RawResponse},
	obs::{self, OpKind},
};

impl<T> Client<T>
where
	T: ?Sized + ApiTransport,
{
	pub(super) async fn settle(&self, request: &ApiRequest, response: RawResponse) -> Result<Value> {
		let body = envelope::decode_body(&response.body);
		let Some(envelope) = Envelope::recognize(&body) else {
			return pass_through(response.status, body);
		};

		match envelope.into_disposition() {
			Disposition::Success(_) if !response.is_success() =>
				Err(Error::UnexpectedResponse { status: response.status, body }),
			Disposition::Success(data) => Ok(data),
			Disposition::Failure(err) => Err(Error::Api(err)),
			Disposition::TokenInvalid(_) =>
				obs::observe(OpKind::Retry, "token_invalid", self.replay(request)).await,
		}
	}

	/// Refreshes, re-signs and reissues `request` exactly once.
	///
	/// Anything but a successful envelope on the replay means the session cannot be
	/// recovered: credentials are cleared and the logout callback runs before the replay's
	/// error is returned. Refresh and transport failures propagate as they are.
	async fn replay(&self, request: &ApiRequest) -> Result<Value> {
		self.refresh.ensure_fresh().await?;

		let outbound = self.sign(request).await?;
		let response = self.transport.execute(&outbound).await?;
		let body = envelope::decode_body(&response.body);
		let err = match Envelope::recognize(&body).map(Envelope::into_disposition) {
			Some(Disposition::Success(data)) if response.is_success() => return Ok(data),
			Some(Disposition::Success(_)) | None =>
				Error::UnexpectedResponse { status: response.status, body },
			Some(Disposition::TokenInvalid(err) | Disposition::Failure(err)) => err.into_error(),
		};

		self.refresh.sign_out().await;

		Err(err)
	}
}

fn pass_through(status: u16, body: Value) -> Result<Value> {
	if (200..300).contains(&status) {
		Ok(body)
	} else {
		Err(Error::UnexpectedResponse { status, body })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn non_envelope_bodies_depend_on_status() {
		assert_eq!(pass_through(200, json!([1, 2])).expect("2xx should pass."), json!([1, 2]));
		assert_eq!(pass_through(204, Value::Null).expect("2xx should pass."), Value::Null);

		let err = pass_through(502, json!("Bad Gateway")).expect_err("5xx should fail.");

		assert!(matches!(
			err,
			Error::UnexpectedResponse { status: 502, body: Value::String(ref text) } if text == "Bad Gateway"
		));
	}
}
