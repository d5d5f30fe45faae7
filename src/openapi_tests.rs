#[cfg(test)]
mod tests {
    use crate::schemas::ApiDoc;
    use utoipa::OpenApi;
    use utoipa::openapi::{PathItemType, RefOr, schema::Schema};

    fn object_properties(name: &str) -> Vec<String> {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.expect("components are generated");
        match components.schemas.get(name) {
            Some(RefOr::T(Schema::Object(obj))) => obj.properties.keys().cloned().collect(),
            _ => panic!("{name} should be an object schema"),
        }
    }

    #[test]
    fn test_openapi_schema_generation() {
        let openapi = ApiDoc::openapi();

        let components = openapi.components.as_ref().unwrap();
        for name in ["ErrorResponse", "HealthResponse", "UserView", "AddUserRequest", "LoginResponse"] {
            assert!(components.schemas.contains_key(name), "missing schema {name}");
        }

        assert!(serde_json::to_string(&openapi).is_ok());
    }

    #[test]
    fn test_error_response_schema_structure() {
        let properties = object_properties("ErrorResponse");
        for field in ["error", "code", "success"] {
            assert!(properties.iter().any(|p| p == field));
        }
    }

    #[test]
    fn test_response_wrapper_aliases() {
        let properties = object_properties("UserViewResponse");
        for field in ["data", "message", "success"] {
            assert!(properties.iter().any(|p| p == field));
        }
    }

    #[test]
    fn test_openapi_paths_cover_every_route() {
        let openapi = ApiDoc::openapi();
        let expected = [
            ("/health", PathItemType::Get),
            ("/api/v1/auth/login", PathItemType::Post),
            ("/api/v1/auth/logout", PathItemType::Post),
            ("/api/v1/auth/change-password", PathItemType::Post),
            ("/api/v1/auth/forgot-password", PathItemType::Post),
            ("/api/v1/auth/reset-password", PathItemType::Post),
            ("/api/v1/me", PathItemType::Get),
            ("/api/v1/admin/users", PathItemType::Get),
            ("/api/v1/admin/users", PathItemType::Post),
            ("/api/v1/admin/users/{user_id}", PathItemType::Put),
            ("/api/v1/admin/users/{user_id}", PathItemType::Delete),
            ("/api/v1/admin/users/{user_id}/reset-password", PathItemType::Post),
            ("/api/v1/files", PathItemType::Get),
            ("/api/v1/files", PathItemType::Post),
            ("/api/v1/files/{file_id}", PathItemType::Delete),
            ("/api/v1/dashboard/average-session-length", PathItemType::Get),
            ("/api/v1/dashboard/active-users", PathItemType::Get),
            ("/api/v1/dashboard/top-queries", PathItemType::Get),
            ("/api/v1/dashboard/gap-in-queries", PathItemType::Get),
            ("/api/v1/dashboard/most-referenced-files", PathItemType::Get),
            ("/api/v1/dashboard/searches-per-user", PathItemType::Get),
            ("/api/v1/ws/dashboard/{topic}", PathItemType::Get),
        ];

        for (path, method) in expected {
            let item = openapi
                .paths
                .paths
                .get(path)
                .unwrap_or_else(|| panic!("missing path {path}"));
            assert!(item.operations.contains_key(&method), "missing {method:?} {path}");
        }
    }

    #[test]
    fn test_health_endpoint_documents_failure() {
        let openapi = ApiDoc::openapi();
        let health = openapi.paths.paths.get("/health").unwrap();
        let get = health.operations.get(&PathItemType::Get).unwrap();

        assert!(get.responses.responses.contains_key("200"));
        assert!(get.responses.responses.contains_key("500"));
    }

    #[test]
    fn test_all_error_responses_reference_correct_schema() {
        let openapi_json = serde_json::to_string(&ApiDoc::openapi()).unwrap();

        assert!(!openapi_json.contains("crate.schemas.ErrorResponse"));
        assert!(!openapi_json.contains("crate::schemas::ErrorResponse"));
        assert!(openapi_json.contains("#/components/schemas/ErrorResponse"));
    }
}
