/// Per-call identity, threaded explicitly through every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestContext {
    pub supplier_account: String,
    pub request_id: String,
}

impl RequestContext {
    pub(crate) fn new(supplier_account: impl Into<String>) -> Self {
        Self {
            supplier_account: supplier_account.into(),
            request_id: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    pub(crate) fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestContext::new("0");
        let b = RequestContext::new("0");
        assert_eq!(a.supplier_account, "0");
        assert_eq!(a.request_id.len(), 32);
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_explicit_request_id() {
        let ctx = RequestContext::new("tenant").with_request_id("rid-1");
        assert_eq!(ctx.request_id, "rid-1");
        assert_eq!(ctx.supplier_account, "tenant");
    }
}
