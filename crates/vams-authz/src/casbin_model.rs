use crate::AuthzResult;
use casbin::prelude::DefaultModel;

// Rule objects are opaque condition ids. Conditions are evaluated in Rust and the
// request object carries the matched ids as ",id1,id2,", so `regexMatch` against
// ",id," selects the rules whose condition held.
const MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act, eft

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow)) && !some(where (p.eft == deny))

[matchers]
m = g(r.sub, p.sub) && regexMatch(r.obj, p.obj) && r.act == p.act
"#;

pub fn casbin_model_string() -> &'static str {
    MODEL
}

pub async fn casbin_model() -> AuthzResult<DefaultModel> {
    Ok(DefaultModel::from_str(MODEL).await?)
}
