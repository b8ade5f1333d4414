//! Typed client for the skills REST API. Each entity kind gets its list,
//! get, create, update and delete calls, plus the specialized endpoints:
//! belt rank patch, waitlist conversion, exam upload and the two binary
//! downloads (exam PDF bundle, exam document).

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use crate::model::{
    BeltList, BeltOne, ClassLevelList, ClassLevelOne, CompletedEvaluation, EvaluationList,
    EvaluationOne, ExamOne, LoginInfo, SchoolClassList, SchoolClassOne, SkillDomainList,
    SkillDomainOne, StudentList, StudentListBare, StudentOne, StudentRank, UserList, UserOne,
    WaitlistEntryList, WaitlistEntryOne,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the credentials or session token. Outside of the
    /// login call itself, the caller must drop its session and force a
    /// logged-out state.
    #[error("{message}")]
    SessionExpired { message: String },
    /// Non-success response; `message` is the server's `{message}` body when
    /// one was provided, a generic status line otherwise.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[source] serde_json::Error),
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        // error bodies optionally carry a human-readable message
        let message = response
            .text()
            .ok()
            .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
            .and_then(|body| {
                body.get("message")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::SessionExpired { message });
        }
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, ApiError> {
        let text = response.text()?;
        serde_json::from_str(&text).map_err(ApiError::Decode)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path))?;
        self.decode(response)
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let response = self.send(self.request(method, path).json(body))?;
        self.decode(response)
    }

    fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, path))?;
        Ok(())
    }

    fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.send(self.request(Method::GET, path))?;
        Ok(response.bytes()?.to_vec())
    }

    // session

    pub fn login(&self, username: &str, password: &str) -> Result<LoginInfo, ApiError> {
        self.send_json(
            Method::POST,
            "/login",
            &json!({ "username": username, "password": password }),
        )
    }

    // users

    pub fn list_users(&self) -> Result<UserList, ApiError> {
        self.get_json("/users")
    }

    pub fn create_user(
        &self,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<UserOne, ApiError> {
        self.send_json(
            Method::POST,
            "/users",
            &json!({ "username": username, "password": password, "is_admin": is_admin }),
        )
    }

    pub fn update_user(&self, user_id: i64, fields: &serde_json::Value) -> Result<UserOne, ApiError> {
        self.send_json(Method::PUT, &format!("/users/{user_id}"), fields)
    }

    pub fn delete_user(&self, user_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/users/{user_id}"))
    }

    // class levels

    pub fn list_class_levels(&self) -> Result<ClassLevelList, ApiError> {
        self.get_json("/class-levels")
    }

    pub fn create_class_level(&self, prefix: &str) -> Result<ClassLevelOne, ApiError> {
        self.send_json(Method::POST, "/class-levels", &json!({ "prefix": prefix }))
    }

    pub fn update_class_level(
        &self,
        class_level_id: i64,
        fields: &serde_json::Value,
    ) -> Result<ClassLevelOne, ApiError> {
        self.send_json(Method::PUT, &format!("/class-levels/{class_level_id}"), fields)
    }

    pub fn delete_class_level(&self, class_level_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/class-levels/{class_level_id}"))
    }

    /// Aggregate view of one class level: its school classes plus the
    /// denormalized belts, skill domains and exams.
    pub fn class_level_detail(&self, class_level_id: i64) -> Result<SchoolClassList, ApiError> {
        self.get_json(&format!("/class-levels/{class_level_id}"))
    }

    pub fn upload_exam(
        &self,
        class_level_id: i64,
        skill_domain_id: i64,
        belt_id: i64,
        code: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ExamOne, ApiError> {
        let form = Form::new()
            .text("skill_domain_id", skill_domain_id.to_string())
            .text("belt_id", belt_id.to_string())
            .text("code", code.to_string())
            .text("filename", filename.to_string())
            .part("file", Part::bytes(bytes).file_name(filename.to_string()));
        let response = self.send(
            self.request(Method::POST, &format!("/class-levels/{class_level_id}/exams"))
                .multipart(form),
        )?;
        self.decode(response)
    }

    // school classes

    pub fn create_school_class(
        &self,
        class_level_id: i64,
        suffix: &str,
    ) -> Result<SchoolClassOne, ApiError> {
        self.send_json(
            Method::POST,
            "/school-classes",
            &json!({ "class_level_id": class_level_id, "suffix": suffix }),
        )
    }

    /// Aggregate view of one school class: its students plus the denormalized
    /// belts, skill domains and per-student awarded belts.
    pub fn school_class_detail(&self, school_class_id: i64) -> Result<StudentList, ApiError> {
        self.get_json(&format!("/school-classes/{school_class_id}"))
    }

    pub fn update_school_class(
        &self,
        school_class_id: i64,
        fields: &serde_json::Value,
    ) -> Result<SchoolClassOne, ApiError> {
        self.send_json(
            Method::PUT,
            &format!("/school-classes/{school_class_id}"),
            fields,
        )
    }

    pub fn delete_school_class(&self, school_class_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/school-classes/{school_class_id}"))
    }

    pub fn school_class_waitlist(
        &self,
        school_class_id: i64,
    ) -> Result<WaitlistEntryList, ApiError> {
        self.get_json(&format!("/school-classes/{school_class_id}/waitlist"))
    }

    /// Printable PDF of the class's pending exams, as raw bytes.
    pub fn school_class_exam_pdf(&self, school_class_id: i64) -> Result<Vec<u8>, ApiError> {
        self.get_bytes(&format!("/school-classes/{school_class_id}/exam-pdf"))
    }

    // students

    pub fn create_student(
        &self,
        school_class_id: i64,
        display_name: &str,
        username: &str,
        password: &str,
    ) -> Result<StudentOne, ApiError> {
        self.send_json(
            Method::POST,
            "/students",
            &json!({
                "school_class_id": school_class_id,
                "display_name": display_name,
                "username": username,
                "password": password,
            }),
        )
    }

    pub fn update_student(
        &self,
        student_id: i64,
        fields: &serde_json::Value,
    ) -> Result<StudentOne, ApiError> {
        self.send_json(Method::PUT, &format!("/students/{student_id}"), fields)
    }

    /// Bulk rank renumbering; the response carries only the changed students.
    pub fn update_student_ranks(&self, ranks: &[StudentRank]) -> Result<StudentListBare, ApiError> {
        self.send_json(Method::PUT, "/students", &json!({ "students": ranks }))
    }

    pub fn delete_student(&self, student_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/students/{student_id}"))
    }

    /// Aggregate view of one student: evaluations plus denormalized context.
    pub fn student_detail(&self, student_id: i64) -> Result<EvaluationList, ApiError> {
        self.get_json(&format!("/students/{student_id}"))
    }

    pub fn add_to_waitlist(
        &self,
        student_id: i64,
        skill_domain_id: i64,
        belt_id: i64,
    ) -> Result<WaitlistEntryOne, ApiError> {
        self.send_json(
            Method::POST,
            &format!("/students/{student_id}/waitlist"),
            &json!({ "skill_domain_id": skill_domain_id, "belt_id": belt_id }),
        )
    }

    pub fn remove_from_waitlist(&self, waitlist_entry_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/waitlist/{waitlist_entry_id}"))
    }

    pub fn convert_waitlist(
        &self,
        completed_evaluations: &[CompletedEvaluation],
    ) -> Result<(), ApiError> {
        self.send(
            self.request(Method::POST, "/waitlist/convert")
                .json(&json!({ "completed_evaluations": completed_evaluations })),
        )?;
        Ok(())
    }

    // skill domains

    pub fn list_skill_domains(&self) -> Result<SkillDomainList, ApiError> {
        self.get_json("/skill-domains")
    }

    pub fn create_skill_domain(&self, name: &str, code: &str) -> Result<SkillDomainOne, ApiError> {
        self.send_json(
            Method::POST,
            "/skill-domains",
            &json!({ "name": name, "code": code }),
        )
    }

    pub fn update_skill_domain(
        &self,
        skill_domain_id: i64,
        fields: &serde_json::Value,
    ) -> Result<SkillDomainOne, ApiError> {
        self.send_json(
            Method::PUT,
            &format!("/skill-domains/{skill_domain_id}"),
            fields,
        )
    }

    pub fn delete_skill_domain(&self, skill_domain_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/skill-domains/{skill_domain_id}"))
    }

    // belts

    pub fn list_belts(&self) -> Result<BeltList, ApiError> {
        self.get_json("/belts")
    }

    pub fn create_belt(&self, name: &str, code: &str, color: &str) -> Result<BeltOne, ApiError> {
        self.send_json(
            Method::POST,
            "/belts",
            &json!({ "name": name, "code": code, "color": color }),
        )
    }

    pub fn update_belt(&self, belt_id: i64, fields: &serde_json::Value) -> Result<BeltOne, ApiError> {
        self.send_json(Method::PUT, &format!("/belts/{belt_id}"), fields)
    }

    pub fn delete_belt(&self, belt_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/belts/{belt_id}"))
    }

    /// Shift a belt's rank by ±1. The response confirms the move with the
    /// belt alone; re-deriving the collection order is the caller's job.
    pub fn patch_belt_rank(&self, belt_id: i64, increase_by: i32) -> Result<BeltOne, ApiError> {
        self.send_json(
            Method::PATCH,
            &format!("/belts/{belt_id}/rank"),
            &json!({ "increase_by": increase_by }),
        )
    }

    // evaluations

    pub fn create_evaluation(
        &self,
        student_id: i64,
        skill_domain_id: i64,
        belt_id: i64,
        date: &str,
        success: bool,
    ) -> Result<EvaluationOne, ApiError> {
        self.send_json(
            Method::POST,
            "/evaluations",
            &json!({
                "student_id": student_id,
                "skill_domain_id": skill_domain_id,
                "belt_id": belt_id,
                "date": date,
                "success": success,
            }),
        )
    }

    pub fn update_evaluation(
        &self,
        evaluation_id: i64,
        fields: &serde_json::Value,
    ) -> Result<EvaluationOne, ApiError> {
        self.send_json(Method::PUT, &format!("/evaluations/{evaluation_id}"), fields)
    }

    pub fn delete_evaluation(&self, evaluation_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/evaluations/{evaluation_id}"))
    }

    // exams

    pub fn exam_document(&self, exam_id: i64) -> Result<Vec<u8>, ApiError> {
        self.get_bytes(&format!("/exams/{exam_id}"))
    }

    pub fn update_exam(&self, exam_id: i64, fields: &serde_json::Value) -> Result<ExamOne, ApiError> {
        self.send_json(Method::PUT, &format!("/exams/{exam_id}"), fields)
    }

    pub fn delete_exam(&self, exam_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/exams/{exam_id}"))
    }
}
