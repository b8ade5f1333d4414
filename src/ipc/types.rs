use serde::Deserialize;

use crate::api::ApiClient;
use crate::model::{
    Belt, ClassLevel, Evaluation, Exam, SchoolClass, SkillDomain, Student, StudentBelts, User,
    WaitlistEntry,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The authenticated session, held immutably between login and logout (or
/// forced expiry). Handlers read it; only the session handlers replace it.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub student: Option<Student>,
}

/// State of one class level's detail view: its school classes plus the
/// denormalized context needed to manage exams.
pub struct LevelView {
    pub class_level: ClassLevel,
    pub school_classes: Vec<SchoolClass>,
    pub belts: Vec<Belt>,
    pub skill_domains: Vec<SkillDomain>,
    pub exams: Vec<Exam>,
}

/// State of one school class's detail view: students, their awarded belts
/// and the pending waitlist.
pub struct ClassView {
    pub class_level: ClassLevel,
    pub school_class: SchoolClass,
    pub students: Vec<Student>,
    pub belts: Vec<Belt>,
    pub skill_domains: Vec<SkillDomain>,
    pub student_belts: Vec<StudentBelts>,
    pub waitlist_entries: Vec<WaitlistEntry>,
}

/// State of one student's detail view: evaluation history plus context.
pub struct StudentView {
    pub class_level: ClassLevel,
    pub school_class: SchoolClass,
    pub student: Student,
    pub belts: Vec<Belt>,
    pub skill_domains: Vec<SkillDomain>,
    pub evaluations: Vec<Evaluation>,
}

/// Single source of truth for everything the shell renders. Each view slot is
/// populated wholesale by its fetch and then patched incrementally after each
/// confirmed server mutation; navigating away simply drops the slot.
pub struct AppState {
    pub api: Option<ApiClient>,
    pub session: Option<Session>,
    pub belts: Option<Vec<Belt>>,
    pub class_levels: Option<Vec<ClassLevel>>,
    pub level: Option<LevelView>,
    pub class: Option<ClassView>,
    pub student: Option<StudentView>,
    pub skill_domains: Option<Vec<SkillDomain>>,
    pub users: Option<Vec<User>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            api: None,
            session: None,
            belts: None,
            class_levels: None,
            level: None,
            class: None,
            student: None,
            skill_domains: None,
            users: None,
        }
    }
}
