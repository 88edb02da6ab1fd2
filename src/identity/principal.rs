/// Identity bound to a request once its bearer token has validated. Handlers take
/// the caller's name from here, never from the request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into() }
    }
}
