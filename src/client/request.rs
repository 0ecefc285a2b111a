//! Request interceptor: refresh a stale token, then sign.

// self
use crate::{
	_prelude::*,
	client::Client,
	http::{ApiRequest, ApiTransport, OutboundRequest},
};

impl<T> Client<T>
where
	T: ?Sized + ApiTransport,
{
	/// Refreshes first when the token is stale, so the signature below carries the new token.
	pub(super) async fn prepare(&self, request: &ApiRequest) -> Result<OutboundRequest> {
		if self.refresh.is_stale().await? {
			self.refresh.ensure_fresh().await?;
		}

		self.sign(request).await
	}

	/// Resolves the URL and merges path, caller and signed query parameters, in increasing
	/// order of precedence.
	pub(super) async fn sign(&self, request: &ApiRequest) -> Result<OutboundRequest> {
		let signed = self.signer.sign(self.store.as_ref()).await?;
		let mut url = self.config.resolve(&request.path)?;
		let mut query = url.query_pairs().into_owned().collect::<BTreeMap<_, _>>();

		query.extend(request.query.iter().map(|(key, value)| (key.clone(), value.clone())));
		signed.merge_into(&mut query);
		url.set_query(None);
		url.query_pairs_mut().extend_pairs(query.iter());

		Ok(OutboundRequest { method: request.method.clone(), url, body: request.body.clone() })
	}
}
