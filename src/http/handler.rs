use crate::http::request::Request;
use crate::http::response::Response;

/// Application logic invoked once per connection with the fully read request.
///
/// The handler runs synchronously on the connection's task. `response` starts
/// out as `Response::default()`. Returning an error replaces whatever was
/// written into `response` with a `500 Internal Server Error` stock reply.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &Request, response: &mut Response) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn handle(&self, request: &Request, response: &mut Response) -> anyhow::Result<()> {
        self(request, response)
    }
}
