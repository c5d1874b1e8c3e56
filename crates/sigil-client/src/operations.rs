//! GraphQL documents for the auth contract.

/// Operation name of the identity query.
pub const ME_OPERATION: &str = "Me";

/// Current user query; its cached result depends on the session.
pub const ME: &str = r#"query Me {
  me {
    id
    name
    username
    email
  }
}"#;

pub const SIGN_IN: &str = r#"mutation SignIn($input: SignInInput!) {
  signIn(input: $input) {
    accessToken
    user {
      id
      name
      username
      email
    }
  }
}"#;

pub const SIGN_UP: &str = r#"mutation SignUp($input: SignUpInput!) {
  signUp(input: $input) {
    accessToken
    user {
      id
      name
      username
      email
    }
  }
}"#;

pub const LOGOUT: &str = r#"mutation Logout {
  logout {
    success
  }
}"#;
