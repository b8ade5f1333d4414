use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::roster::{HasId, Ranked};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub username: String,
    pub is_admin: bool,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassLevel {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolClass {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub class_level_id: i64,
    pub suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub user_id: i64,
    pub username: String,
    pub last_login: Option<DateTime<Utc>>,
    pub school_class_id: i64,
    pub display_name: String,
    pub rank: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Belt {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub rank: i32,
    pub name: String,
    pub code: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDomain {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub student_id: i64,
    pub skill_domain_id: i64,
    pub belt_id: i64,
    pub date: NaiveDate,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub student_id: i64,
    pub skill_domain_id: i64,
    pub belt_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub class_level_id: i64,
    pub skill_domain_id: i64,
    pub belt_id: i64,
    pub code: String,
    pub filename: String,
}

/// One awarded belt of a student in one skill domain, as denormalized by the
/// school-class aggregate endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentBelt {
    pub skill_domain_id: i64,
    pub belt_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentBelts {
    pub student_id: i64,
    pub belts: Vec<StudentBelt>,
}

impl HasId for User {
    fn id(&self) -> i64 {
        self.id
    }
}

impl HasId for ClassLevel {
    fn id(&self) -> i64 {
        self.id
    }
}

impl HasId for SchoolClass {
    fn id(&self) -> i64 {
        self.id
    }
}

impl HasId for Student {
    fn id(&self) -> i64 {
        self.id
    }
}

impl HasId for Belt {
    fn id(&self) -> i64 {
        self.id
    }
}

impl HasId for SkillDomain {
    fn id(&self) -> i64 {
        self.id
    }
}

impl HasId for Evaluation {
    fn id(&self) -> i64 {
        self.id
    }
}

impl HasId for WaitlistEntry {
    fn id(&self) -> i64 {
        self.id
    }
}

impl HasId for Exam {
    fn id(&self) -> i64 {
        self.id
    }
}

impl Ranked for Belt {
    fn rank(&self) -> i32 {
        self.rank
    }

    fn set_rank(&mut self, rank: i32) {
        self.rank = rank;
    }
}

impl Ranked for Student {
    fn rank(&self) -> i32 {
        self.rank
    }

    fn set_rank(&mut self, rank: i32) {
        self.rank = rank;
    }
}

// Wire payloads. List endpoints wrap collections in an object keyed by the
// plural name; aggregate views denormalize the joined rows alongside.

#[derive(Debug, Clone, Deserialize)]
pub struct BeltList {
    pub belts: Vec<Belt>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BeltOne {
    pub belt: Belt,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserList {
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserOne {
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassLevelList {
    pub class_levels: Vec<ClassLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassLevelOne {
    pub class_level: ClassLevel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchoolClassList {
    pub belts: Vec<Belt>,
    pub skill_domains: Vec<SkillDomain>,
    pub class_level: ClassLevel,
    pub school_classes: Vec<SchoolClass>,
    pub exams: Vec<Exam>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchoolClassOne {
    pub class_level: ClassLevel,
    pub school_class: SchoolClass,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentList {
    pub belts: Vec<Belt>,
    pub skill_domains: Vec<SkillDomain>,
    pub class_level: ClassLevel,
    pub school_class: SchoolClass,
    pub students: Vec<Student>,
    pub student_belts: Vec<StudentBelts>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentListBare {
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentOne {
    pub class_level: ClassLevel,
    pub school_class: SchoolClass,
    pub user: User,
    pub student: Student,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkillDomainList {
    pub skill_domains: Vec<SkillDomain>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkillDomainOne {
    pub skill_domain: SkillDomain,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationList {
    pub class_level: ClassLevel,
    pub school_class: SchoolClass,
    pub student: Student,
    pub skill_domains: Vec<SkillDomain>,
    pub belts: Vec<Belt>,
    pub evaluations: Vec<Evaluation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationOne {
    pub class_level: ClassLevel,
    pub school_class: SchoolClass,
    pub student: Student,
    pub skill_domain: SkillDomain,
    pub belt: Belt,
    pub evaluation: Evaluation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitlistEntryList {
    pub waitlist_entries: Vec<WaitlistEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitlistEntryOne {
    pub waitlist_entry: WaitlistEntry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExamOne {
    pub exam: Exam,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginPayload {
    pub user_id: i64,
    pub exp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInfo {
    pub payload: LoginPayload,
    pub token: String,
    pub user: User,
    pub student: Option<Student>,
}

/// One row of the bulk rank-renumbering request.
#[derive(Debug, Clone, Serialize)]
pub struct StudentRank {
    pub id: i64,
    pub rank: i32,
}

/// One row of the waitlist conversion batch, as posted to the server.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedEvaluation {
    pub waitlist_entry_id: i64,
    pub date: NaiveDate,
    pub success: bool,
}
