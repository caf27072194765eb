//! Access scope resolution and filter sanitization. Both are best-effort:
//! out-of-scope or malformed filter input degrades to "no filter", never
//! to an error surfaced to the caller.

use crate::models::{
    AccessScope, AdvisorRef, CategoryRef, FilterSelection, RawFilters, ResponseRow, StudentRef,
    Viewer, ViewerRole,
};
use crate::taxonomy;

impl AccessScope {
    /// Derive the accessible student/advisor id sets once per invocation.
    /// Admins and unrestricted advisors see the whole roster; an advisor
    /// restricted to their own advisees sees only those students; a
    /// student-equivalent viewer sees only themselves.
    pub fn resolve(viewer: &Viewer, students: &[StudentRef], advisors: &[AdvisorRef]) -> Self {
        let mut scope = AccessScope::default();

        match viewer.role {
            ViewerRole::Admin => {
                scope.student_ids.extend(students.iter().map(|s| s.id));
                scope.advisor_ids.extend(advisors.iter().map(|a| a.id));
            }
            ViewerRole::Advisor => match (viewer.own_advisees_only, viewer.id) {
                (true, Some(advisor_id)) => {
                    scope.student_ids.extend(
                        students
                            .iter()
                            .filter(|s| s.advisor_id == Some(advisor_id))
                            .map(|s| s.id),
                    );
                    if advisors.iter().any(|a| a.id == advisor_id) {
                        scope.advisor_ids.insert(advisor_id);
                    }
                }
                _ => {
                    scope.student_ids.extend(students.iter().map(|s| s.id));
                    scope.advisor_ids.extend(advisors.iter().map(|a| a.id));
                }
            },
            ViewerRole::Student => {
                if let Some(student) = viewer
                    .id
                    .and_then(|id| students.iter().find(|s| s.id == id))
                {
                    scope.student_ids.insert(student.id);
                    if let Some(advisor_id) = student.advisor_id {
                        scope.advisor_ids.insert(advisor_id);
                    }
                }
            }
        }

        scope
    }
}

fn scalar(value: Option<&str>) -> Option<&str> {
    let trimmed = value?.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        return None;
    }
    Some(trimmed)
}

fn positive_id(value: Option<&str>) -> Option<i64> {
    scalar(value)?.parse::<i64>().ok().filter(|id| *id > 0)
}

impl FilterSelection {
    /// Sanitize raw filter input against the viewer's scope and the
    /// category table. Unresolvable values are dropped; resolving the
    /// same input twice yields the same selection.
    pub fn resolve(raw: &RawFilters, scope: &AccessScope, categories: &[CategoryRef]) -> Self {
        let student_id =
            positive_id(raw.student.as_deref()).filter(|id| scope.student_ids.contains(id));
        let advisor_id =
            positive_id(raw.advisor.as_deref()).filter(|id| scope.advisor_ids.contains(id));

        FilterSelection {
            track: scalar(raw.track.as_deref()).map(str::to_string),
            semester: scalar(raw.semester.as_deref()).map(str::to_string),
            survey_id: positive_id(raw.survey.as_deref()),
            domain: resolve_domain(raw.category.as_deref(), categories),
            student_id,
            advisor_id,
            competency: resolve_competency(raw.competency.as_deref()),
        }
    }

    /// Whether a normalized row survives the scalar filters. Domain and
    /// competency filters go through the taxonomy, so rows outside the
    /// canonical sets drop out when those filters are set.
    pub fn matches(&self, row: &ResponseRow) -> bool {
        if let Some(track) = &self.track {
            if &row.track != track {
                return false;
            }
        }
        if let Some(semester) = &self.semester {
            if &row.survey_semester != semester {
                return false;
            }
        }
        if let Some(survey_id) = self.survey_id {
            if row.survey_id != survey_id {
                return false;
            }
        }
        if let Some(student_id) = self.student_id {
            if row.student_id != student_id {
                return false;
            }
        }
        if let Some(advisor_id) = self.advisor_id {
            if row.advisor_id != Some(advisor_id) {
                return false;
            }
        }
        if let Some(domain) = &self.domain {
            match taxonomy::domain_for_category(&row.category_name) {
                Some(resolved) if taxonomy::slugify(resolved) == *domain => {}
                _ => return false,
            }
        }
        if let Some(competency) = &self.competency {
            match taxonomy::match_competency(&row.question_text) {
                Some(matched) if taxonomy::slugify(matched.title) == *competency => {}
                _ => return false,
            }
        }
        true
    }

    /// Whether a roster entry survives the student-level filters. Used for
    /// the `total_students` denominators, which must count accessible
    /// students with no rows at all.
    pub fn matches_student(&self, student: &StudentRef) -> bool {
        if let Some(student_id) = self.student_id {
            if student.id != student_id {
                return false;
            }
        }
        if let Some(track) = &self.track {
            if &student.track != track {
                return false;
            }
        }
        if let Some(advisor_id) = self.advisor_id {
            if student.advisor_id != Some(advisor_id) {
                return false;
            }
        }
        true
    }
}

/// A category filter accepts either a raw numeric category id (mapped
/// through the category table) or a domain-name slug. Either way the
/// result must land on one of the canonical report domains.
fn resolve_domain(raw: Option<&str>, categories: &[CategoryRef]) -> Option<String> {
    let value = scalar(raw)?;

    if let Ok(id) = value.parse::<i64>() {
        let category = categories.iter().find(|c| c.id == id)?;
        return taxonomy::domain_for_category(&category.name).map(taxonomy::slugify);
    }
    taxonomy::canonical_domain(value).map(taxonomy::slugify)
}

fn resolve_competency(raw: Option<&str>) -> Option<String> {
    let value = scalar(raw)?;
    taxonomy::match_competency(value)
        .map(|competency| taxonomy::slugify(competency.title))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> (Vec<StudentRef>, Vec<AdvisorRef>) {
        let students = vec![
            StudentRef {
                id: 1,
                name: "Avery Lee".to_string(),
                track: "Residential".to_string(),
                advisor_id: Some(10),
            },
            StudentRef {
                id: 2,
                name: "Jules Moreno".to_string(),
                track: "Executive".to_string(),
                advisor_id: Some(11),
            },
            StudentRef {
                id: 3,
                name: "Kiara Patel".to_string(),
                track: "Residential".to_string(),
                advisor_id: Some(10),
            },
        ];
        let advisors = vec![
            AdvisorRef { id: 10, name: "Dana Okafor".to_string() },
            AdvisorRef { id: 11, name: "Sam Whitfield".to_string() },
        ];
        (students, advisors)
    }

    fn admin() -> Viewer {
        Viewer {
            role: ViewerRole::Admin,
            id: None,
            own_advisees_only: false,
            utc_offset_minutes: 0,
        }
    }

    #[test]
    fn admin_sees_whole_roster() {
        let (students, advisors) = roster();
        let scope = AccessScope::resolve(&admin(), &students, &advisors);
        assert_eq!(scope.student_ids.len(), 3);
        assert_eq!(scope.advisor_ids.len(), 2);
    }

    #[test]
    fn restricted_advisor_sees_only_advisees() {
        let (students, advisors) = roster();
        let viewer = Viewer {
            role: ViewerRole::Advisor,
            id: Some(10),
            own_advisees_only: true,
            utc_offset_minutes: 0,
        };
        let scope = AccessScope::resolve(&viewer, &students, &advisors);
        assert!(scope.student_ids.contains(&1));
        assert!(scope.student_ids.contains(&3));
        assert!(!scope.student_ids.contains(&2));
    }

    #[test]
    fn student_viewer_sees_only_themselves() {
        let (students, advisors) = roster();
        let viewer = Viewer {
            role: ViewerRole::Student,
            id: Some(2),
            own_advisees_only: false,
            utc_offset_minutes: 0,
        };
        let scope = AccessScope::resolve(&viewer, &students, &advisors);
        assert_eq!(scope.student_ids.len(), 1);
        assert!(scope.student_ids.contains(&2));
    }

    #[test]
    fn blank_and_all_values_mean_no_filter() {
        let (students, advisors) = roster();
        let scope = AccessScope::resolve(&admin(), &students, &advisors);
        let raw = RawFilters {
            track: Some("  ".to_string()),
            semester: Some("all".to_string()),
            survey: Some("0".to_string()),
            ..RawFilters::default()
        };
        let filters = FilterSelection::resolve(&raw, &scope, &[]);
        assert_eq!(filters, FilterSelection::default());
    }

    #[test]
    fn out_of_scope_student_filter_degrades_to_unset() {
        let (students, advisors) = roster();
        let viewer = Viewer {
            role: ViewerRole::Advisor,
            id: Some(10),
            own_advisees_only: true,
            utc_offset_minutes: 0,
        };
        let scope = AccessScope::resolve(&viewer, &students, &advisors);

        // student 2 belongs to the other advisor
        let raw = RawFilters {
            student: Some("2".to_string()),
            ..RawFilters::default()
        };
        let filtered = FilterSelection::resolve(&raw, &scope, &[]);
        let unfiltered = FilterSelection::resolve(&RawFilters::default(), &scope, &[]);
        assert_eq!(filtered, unfiltered);
    }

    #[test]
    fn resolution_is_idempotent() {
        let (students, advisors) = roster();
        let scope = AccessScope::resolve(&admin(), &students, &advisors);
        let raw = RawFilters {
            track: Some("Residential".to_string()),
            student: Some("1".to_string()),
            competency: Some("Project Management Reflection".to_string()),
            ..RawFilters::default()
        };
        let first = FilterSelection::resolve(&raw, &scope, &[]);
        let second = FilterSelection::resolve(&raw, &scope, &[]);
        assert_eq!(first, second);
        assert_eq!(first.competency.as_deref(), Some("project_management"));
    }

    #[test]
    fn category_filter_accepts_id_or_domain_slug() {
        let (students, advisors) = roster();
        let scope = AccessScope::resolve(&admin(), &students, &advisors);
        let categories = vec![
            CategoryRef { id: 5, name: "Leadership & Practice".to_string() },
            CategoryRef { id: 6, name: "Evidence Portfolio".to_string() },
        ];

        let by_id = FilterSelection::resolve(
            &RawFilters { category: Some("5".to_string()), ..RawFilters::default() },
            &scope,
            &categories,
        );
        assert_eq!(by_id.domain.as_deref(), Some("leadership_practice"));

        let by_slug = FilterSelection::resolve(
            &RawFilters {
                category: Some("leadership_practice".to_string()),
                ..RawFilters::default()
            },
            &scope,
            &categories,
        );
        assert_eq!(by_slug.domain.as_deref(), Some("leadership_practice"));

        // a real category outside the canonical domains is not a domain filter
        let non_canonical = FilterSelection::resolve(
            &RawFilters { category: Some("6".to_string()), ..RawFilters::default() },
            &scope,
            &categories,
        );
        assert_eq!(non_canonical.domain, None);
    }

    #[test]
    fn unknown_competency_degrades_to_unset() {
        let (students, advisors) = roster();
        let scope = AccessScope::resolve(&admin(), &students, &advisors);
        let raw = RawFilters {
            competency: Some("Underwater Basket Weaving".to_string()),
            ..RawFilters::default()
        };
        let filters = FilterSelection::resolve(&raw, &scope, &[]);
        assert_eq!(filters.competency, None);
    }
}
