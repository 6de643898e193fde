use serde::{Deserialize, Serialize};

use crate::NOT_SPECIFIED;

/// One harvested résumé. Every field is display-ready text; fields absent from the
/// source page carry a placeholder instead of being empty.
///
/// Field order is the column order of the dataset, and the serde names are the
/// column headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRecord {
    #[serde(rename = "ФИО")]
    pub full_name: String,
    #[serde(rename = "Желаемая должность")]
    pub desired_position: String,
    #[serde(rename = "Зарплата")]
    pub salary: String,
    #[serde(rename = "Личная информация")]
    pub personal_info: String,
    #[serde(rename = "Местоположение")]
    pub location: String,
    #[serde(rename = "Занятость и график")]
    pub employment: String,
    #[serde(rename = "Общий опыт")]
    pub total_experience: String,
    #[serde(rename = "Последнее место работы")]
    pub last_job: String,
    #[serde(rename = "Обязанности")]
    pub last_job_description: String,
    #[serde(rename = "Ключевые навыки")]
    pub skills: String,
    #[serde(rename = "Обо мне")]
    pub about: String,
    #[serde(rename = "Образование")]
    pub education: String,
    #[serde(rename = "Языки")]
    pub languages: String,
    #[serde(rename = "Ссылка")]
    pub url: String,
}

/// The fixed set of columns of a `ResumeRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    FullName,
    DesiredPosition,
    Salary,
    PersonalInfo,
    Location,
    Employment,
    TotalExperience,
    LastJob,
    LastJobDescription,
    Skills,
    About,
    Education,
    Languages,
    Url,
}

impl Field {
    /// All fields, in column order.
    pub const ALL: [Field; 14] = [
        Field::FullName,
        Field::DesiredPosition,
        Field::Salary,
        Field::PersonalInfo,
        Field::Location,
        Field::Employment,
        Field::TotalExperience,
        Field::LastJob,
        Field::LastJobDescription,
        Field::Skills,
        Field::About,
        Field::Education,
        Field::Languages,
        Field::Url,
    ];

    /// The column header used for this field in the dataset.
    pub fn column(self) -> &'static str {
        match self {
            Field::FullName => "ФИО",
            Field::DesiredPosition => "Желаемая должность",
            Field::Salary => "Зарплата",
            Field::PersonalInfo => "Личная информация",
            Field::Location => "Местоположение",
            Field::Employment => "Занятость и график",
            Field::TotalExperience => "Общий опыт",
            Field::LastJob => "Последнее место работы",
            Field::LastJobDescription => "Обязанности",
            Field::Skills => "Ключевые навыки",
            Field::About => "Обо мне",
            Field::Education => "Образование",
            Field::Languages => "Языки",
            Field::Url => "Ссылка",
        }
    }
}

impl ResumeRecord {
    /// A record for `url` with every other field set to the placeholder.
    pub fn unspecified(url: impl Into<String>) -> Self {
        let na = || NOT_SPECIFIED.to_string();
        Self {
            full_name: na(),
            desired_position: na(),
            salary: na(),
            personal_info: na(),
            location: na(),
            employment: na(),
            total_experience: na(),
            last_job: na(),
            last_job_description: na(),
            skills: na(),
            about: na(),
            education: na(),
            languages: na(),
            url: url.into(),
        }
    }

    /// Returns the value stored in the column of `field`.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::FullName => &self.full_name,
            Field::DesiredPosition => &self.desired_position,
            Field::Salary => &self.salary,
            Field::PersonalInfo => &self.personal_info,
            Field::Location => &self.location,
            Field::Employment => &self.employment,
            Field::TotalExperience => &self.total_experience,
            Field::LastJob => &self.last_job,
            Field::LastJobDescription => &self.last_job_description,
            Field::Skills => &self.skills,
            Field::About => &self.about,
            Field::Education => &self.education,
            Field::Languages => &self.languages,
            Field::Url => &self.url,
        }
    }

    pub(crate) fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::FullName => &mut self.full_name,
            Field::DesiredPosition => &mut self.desired_position,
            Field::Salary => &mut self.salary,
            Field::PersonalInfo => &mut self.personal_info,
            Field::Location => &mut self.location,
            Field::Employment => &mut self.employment,
            Field::TotalExperience => &mut self.total_experience,
            Field::LastJob => &mut self.last_job,
            Field::LastJobDescription => &mut self.last_job_description,
            Field::Skills => &mut self.skills,
            Field::About => &mut self.about,
            Field::Education => &mut self.education,
            Field::Languages => &mut self.languages,
            Field::Url => &mut self.url,
        };
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The serialized header must line up with `Field::ALL`.
    #[test]
    fn test_header_matches_field_columns() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .serialize(ResumeRecord::unspecified("https://hh.ru/resume/1"))
            .unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header = text.lines().next().unwrap();

        let expected = Field::ALL.iter().map(|f| f.column()).collect::<Vec<_>>().join(",");
        assert_eq!(header, expected);
    }

    #[test]
    fn test_get_and_set() {
        let mut record = ResumeRecord::unspecified("https://hh.ru/resume/1");
        assert_eq!(record.get(Field::Salary), NOT_SPECIFIED);
        assert_eq!(record.get(Field::Url), "https://hh.ru/resume/1");

        record.set(Field::Salary, "100 000 ₽".to_string());
        assert_eq!(record.salary, "100 000 ₽");
    }
}
