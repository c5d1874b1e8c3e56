//! Auth API.

use serde::Deserialize;
use serde_json::json;

use crate::client::GraphQLClient;
use crate::error::{Error, Result};
use crate::operations;
use crate::types::{AuthPayload, GraphQLRequest, LogoutPayload, Profile, SignInInput, SignUpInput};

/// Auth API client.
pub struct AuthApi {
    client: GraphQLClient,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInData {
    sign_in: Option<AuthPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpData {
    sign_up: Option<AuthPayload>,
}

#[derive(Deserialize)]
struct LogoutData {
    logout: Option<LogoutPayload>,
}

#[derive(Deserialize)]
struct MeData {
    me: Option<Profile>,
}

impl AuthApi {
    pub(crate) fn new(client: GraphQLClient) -> Self {
        Self { client }
    }

    /// Request for the identity query.
    pub fn me_request() -> GraphQLRequest {
        GraphQLRequest::new(operations::ME_OPERATION, operations::ME)
    }

    /// Exchange credentials for a session token.
    pub async fn sign_in(&self, input: &SignInInput) -> Result<AuthPayload> {
        let request = GraphQLRequest::new("SignIn", operations::SIGN_IN)
            .with_variables(json!({ "input": input }));
        let data: SignInData = self.client.execute(&request).await?;
        data.sign_in
            .ok_or_else(|| Error::MissingData("signIn".to_string()))
    }

    /// Register a new account and receive a session token.
    pub async fn sign_up(&self, input: &SignUpInput) -> Result<AuthPayload> {
        let request = GraphQLRequest::new("SignUp", operations::SIGN_UP)
            .with_variables(json!({ "input": input }));
        let data: SignUpData = self.client.execute(&request).await?;
        data.sign_up
            .ok_or_else(|| Error::MissingData("signUp".to_string()))
    }

    /// Invalidate the session on the server.
    pub async fn logout(&self) -> Result<LogoutPayload> {
        let request = GraphQLRequest::new("Logout", operations::LOGOUT);
        let data: LogoutData = self.client.execute(&request).await?;
        Ok(data.logout.unwrap_or_default())
    }

    /// Fetch the current user straight from the server.
    pub async fn me(&self) -> Result<Option<Profile>> {
        let data: MeData = self.client.execute(&Self::me_request()).await?;
        Ok(data.me)
    }
}
