use chrono::{DateTime, TimeZone, Utc};

use crate::models::{Profile, School};

/// Built-in profiles shown when the store is unconfigured or unreachable
pub fn sample_profiles() -> Vec<Profile> {
    let created_at = sample_created_at();
    vec![
        sample(
            "1",
            "sarah.chen@stanford.edu",
            "Sarah Chen",
            27,
            School::StanfordGsb,
            "UC Berkeley",
            "McKinsey & Company",
            "Former McKinsey consultant turned startup founder. Love sailing, wine tasting, and finding the next unicorn. Ready to make some waves in Croatia!",
            &["Sailing", "Startups", "Wine", "Travel", "Consulting", "Networking"],
            "https://images.pexels.com/photos/1239291/pexels-photo-1239291.jpeg",
            created_at,
        ),
        sample(
            "2",
            "james.wilson@hbs.edu",
            "James Wilson",
            29,
            School::HarvardBusinessSchool,
            "Harvard College",
            "Goldman Sachs",
            "Investment banker by day, adventure seeker by weekend. Excited to trade spreadsheets for sunsets and network with amazing people. Let's make this yacht week unforgettable!",
            &["Finance", "Adventure Sports", "Photography", "Cocktails", "Networking", "Travel"],
            "https://images.pexels.com/photos/91227/pexels-photo-91227.jpeg",
            created_at,
        ),
        sample(
            "3",
            "maria.garcia@stanford.edu",
            "Maria Garcia",
            26,
            School::StanfordGsb,
            "Stanford University",
            "Google",
            "Tech PM with a passion for sustainable business and ocean conservation. Looking forward to meaningful conversations and beautiful sunsets in Croatia.",
            &["Tech", "Sustainability", "Ocean Conservation", "Yoga", "Reading", "Hiking"],
            "https://images.pexels.com/photos/1181686/pexels-photo-1181686.jpeg",
            created_at,
        ),
        sample(
            "4",
            "david.kim@hbs.edu",
            "David Kim",
            28,
            School::HarvardBusinessSchool,
            "MIT",
            "Apple",
            "Former Google product manager now building the next big thing in fintech. Love good food, great conversations, and even better company for yacht adventures.",
            &["Fintech", "Product Management", "Cooking", "Music", "Entrepreneurship", "Swimming"],
            "https://images.pexels.com/photos/1043471/pexels-photo-1043471.jpeg",
            created_at,
        ),
        sample(
            "5",
            "emma.thompson@stanford.edu",
            "Emma Thompson",
            25,
            School::StanfordGsb,
            "Yale University",
            "Bain & Company",
            "Strategy consultant turned social impact entrepreneur. Passionate about making business a force for good. Ready to dive deep into conversations and Croatian waters!",
            &["Social Impact", "Strategy", "Environmental Policy", "Swimming", "Art", "Culture"],
            "https://images.pexels.com/photos/1065084/pexels-photo-1065084.jpeg",
            created_at,
        ),
    ]
}

fn sample_created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[allow(clippy::too_many_arguments)]
fn sample(
    id: &str,
    email: &str,
    full_name: &str,
    age: u8,
    school: School,
    undergrad_school: &str,
    pre_mba_company: &str,
    bio: &str,
    interests: &[&str],
    photo_url: &str,
    created_at: DateTime<Utc>,
) -> Profile {
    Profile {
        id: id.to_string(),
        email: email.to_string(),
        full_name: full_name.to_string(),
        age,
        school,
        bio: bio.to_string(),
        undergrad_school: Some(undergrad_school.to_string()),
        pre_mba_company: Some(pre_mba_company.to_string()),
        interests: interests.iter().map(|i| i.to_string()).collect(),
        photo_urls: vec![photo_url.to_string()],
        created_at,
    }
}
